//! Integration tests for placeholder allocation and embedding.

mod common;

use certseal::document::PdfStructure;
use certseal::signatures::{
    allocate, digest, embed, ByteRange, KeyMaterial, PdfSigner, SignOptions, SignableDocument,
    SignatureBuilder, SignaturePlaceholder, BYTE_RANGE_TEXT_LEN, DEFAULT_MAX_SIGNATURE_SIZE,
};
use certseal::Error;
use common::{issue_cert, rsa_key, sample_pdf, signing_time, CertSpec, Pki};
use proptest::prelude::*;

fn options() -> SignOptions {
    SignOptions::default().with_signing_time(signing_time())
}

mod allocation_tests {
    use super::*;

    #[test]
    fn test_layout_of_prepared_document() {
        let original = sample_pdf(1_500);
        let document = SignableDocument::new(original.clone()).unwrap();
        let (prepared, range, placeholder) = allocate(&document, &options()).unwrap();
        let bytes = prepared.as_bytes();

        assert!(bytes.starts_with(&original));
        assert_eq!(range.gap(), Some((placeholder.offset(), placeholder.length())));
        assert!(range.covers_all_but_gap(bytes.len()));
        assert!(placeholder.offset() > original.len());

        let window = &bytes[placeholder.offset()..placeholder.end()];
        assert_eq!(window.first(), Some(&b'<'));
        assert_eq!(window.last(), Some(&b'>'));
        assert!(window[1..window.len() - 1].iter().all(|&b| b == b'0'));
        assert_eq!(placeholder.capacity(), options().max_signature_size);
    }

    #[test]
    fn test_byte_range_is_patched_in_place() {
        let document = SignableDocument::new(sample_pdf(800)).unwrap();
        let (prepared, range, _) = allocate(&document, &options()).unwrap();
        let text = String::from_utf8_lossy(prepared.as_bytes()).into_owned();

        let start = text.find("/ByteRange ").unwrap() + "/ByteRange ".len();
        let written = &text[start..start + BYTE_RANGE_TEXT_LEN];
        assert_eq!(written, range.to_fixed_width().unwrap());
        assert!(written.starts_with("[0 "));
        assert!(written.ends_with(']'));
    }

    #[test]
    fn test_update_is_readable() {
        let document = SignableDocument::new(sample_pdf(800)).unwrap();
        let (prepared, _, _) = allocate(&document, &options()).unwrap();

        let structure = PdfStructure::parse(prepared.as_bytes()).unwrap();
        let catalog = structure.catalog().unwrap();
        assert!(catalog.contains_key("AcroForm"));
        assert!(structure.has_signed_field(&catalog).unwrap());
        assert_eq!(structure.size().unwrap(), 8);
    }

    #[test]
    fn test_rejects_non_pdf() {
        assert!(matches!(
            SignableDocument::new(b"hello world".to_vec()),
            Err(Error::UnsupportedDocument(_))
        ));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let document = SignableDocument::new(sample_pdf(300)).unwrap();
        let err = allocate(&document, &options().with_max_signature_size(0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_range_covers_all_but_window(
            content_len in 0usize..4_000,
            capacity in 1usize..20_000,
        ) {
            let document = SignableDocument::new(sample_pdf(content_len)).unwrap();
            let (prepared, range, placeholder) =
                allocate(&document, &options().with_max_signature_size(capacity)).unwrap();

            let len = prepared.len();
            prop_assert!(range.covers_all_but_gap(len));
            prop_assert_eq!(range.covered_len() + placeholder.length(), len);
            prop_assert_eq!(placeholder.length(), 2 * capacity + 2);
            prop_assert_eq!(range.ranges()[1].0, placeholder.end());
        }
    }
}

mod embedding_tests {
    use super::*;

    #[test]
    fn test_oversized_signature_is_rejected() {
        let pki = Pki::new();
        let err = PdfSigner::new(options().with_max_signature_size(512))
            .sign_bytes(&sample_pdf(500), &pki.key)
            .unwrap_err();
        assert!(matches!(err, Error::SignatureTooLarge { capacity: 512, .. }));
    }

    #[test]
    fn test_long_chain_overflows_default_window() {
        let root_key = rsa_key(1);
        let ca_key = rsa_key(2);
        let leaf_key = rsa_key(0);

        let root = issue_cert(&CertSpec::root("CN=Test Root CA"), &root_key, &root_key);
        let mut chain = vec![root];
        let mut issuer = "CN=Test Root CA".to_string();
        for level in 0..16 {
            let subject = format!("CN=Issuing CA {}", level);
            let signing_key = if level == 0 { &root_key } else { &ca_key };
            let spec = CertSpec::intermediate(&subject, &issuer);
            chain.insert(0, issue_cert(&spec, &ca_key, signing_key));
            issuer = subject;
        }
        let leaf = issue_cert(&CertSpec::leaf("CN=Jane Signer", &issuer), &leaf_key, &ca_key);
        chain.insert(0, leaf);
        let key = KeyMaterial::new(leaf_key, chain).unwrap();

        let opts = options();
        assert_eq!(opts.max_signature_size, DEFAULT_MAX_SIGNATURE_SIZE);
        let err = PdfSigner::new(opts).sign_bytes(&sample_pdf(500), &key).unwrap_err();
        match err {
            Error::SignatureTooLarge { size, capacity } => {
                assert_eq!(capacity, DEFAULT_MAX_SIGNATURE_SIZE);
                assert!(size > capacity);
            },
            other => panic!("expected SignatureTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_embed_checks_window_capacity() {
        let pki = Pki::new();
        let document = SignableDocument::new(sample_pdf(500)).unwrap();
        let small = options().with_max_signature_size(512);
        let (prepared, range, placeholder) = allocate(&document, &small).unwrap();

        // The builder allows more than the window holds.
        let document_digest = digest(&prepared, &range, small.digest_algorithm).unwrap();
        let signature = SignatureBuilder::new(16_384).sign(&document_digest, &pki.key).unwrap();

        let err = embed(prepared, &placeholder, &signature).unwrap_err();
        assert!(matches!(err, Error::SignatureTooLarge { capacity: 512, .. }));
    }

    #[test]
    fn test_embed_rejects_foreign_placeholder() {
        let pki = Pki::new();
        let document = SignableDocument::new(sample_pdf(500)).unwrap();
        let (prepared, range, placeholder) = allocate(&document, &options()).unwrap();
        let document_digest = digest(&prepared, &range, options().digest_algorithm).unwrap();
        let signature =
            SignatureBuilder::from_options(&options()).sign(&document_digest, &pki.key).unwrap();

        let foreign = SignaturePlaceholder::new(placeholder.offset() + 1, placeholder.capacity());
        let err = embed(prepared, &foreign, &signature).unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[test]
    fn test_embed_changes_only_the_window() {
        let pki = Pki::new();
        let document = SignableDocument::new(sample_pdf(500)).unwrap();
        let (prepared, range, placeholder) = allocate(&document, &options()).unwrap();
        let before = prepared.as_bytes().to_vec();
        let document_digest = digest(&prepared, &range, options().digest_algorithm).unwrap();
        let signature =
            SignatureBuilder::from_options(&options()).sign(&document_digest, &pki.key).unwrap();

        let after = embed(prepared, &placeholder, &signature).unwrap();
        assert_eq!(after.len(), before.len());
        for &(offset, length) in range.ranges() {
            assert_eq!(&after[offset..offset + length], &before[offset..offset + length]);
        }
        assert_ne!(
            &after[placeholder.offset()..placeholder.end()],
            &before[placeholder.offset()..placeholder.end()]
        );
    }

    #[test]
    fn test_byte_range_rejects_overlap() {
        assert!(matches!(ByteRange::new(vec![(0, 10), (5, 10)]), Err(Error::InvalidRange(_))));
    }
}
