use layercodec::codec::CodecError;
use layercodec::{Codec, CodecConfig, HeaderRegistry};
use std::io::Write;

#[test]
fn test_defaults() {
    let config = CodecConfig::default();
    assert_eq!(config.max_headers, 64);
    assert_eq!(config.encode_capacity, 1514);
    assert_eq!(Codec::default().config(), &config);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = CodecConfig::from_toml("max_headers = 8").expect("parse");
    assert_eq!(config.max_headers, 8);
    assert_eq!(config.encode_capacity, 1514);
}

#[test]
fn test_zero_header_limit_is_rejected() {
    let err = CodecConfig::from_toml("max_headers = 0").expect_err("invalid");
    assert!(matches!(err, CodecError::Config(ref m) if m.contains("max_headers")));

    let config = CodecConfig {
        max_headers: 0,
        ..CodecConfig::default()
    };
    assert!(Codec::with_config(HeaderRegistry::with_defaults(), config).is_err());
}

#[test]
fn test_bad_toml_is_rejected() {
    let err = CodecConfig::from_toml("max_headers = \"many\"").expect_err("invalid");
    assert!(err.to_string().starts_with("Config: Failed to parse TOML"));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "max_headers = 16").expect("write");
    writeln!(file, "encode_capacity = 9000").expect("write");
    let config = CodecConfig::from_file(file.path()).expect("load");
    assert_eq!(
        config,
        CodecConfig {
            max_headers: 16,
            encode_capacity: 9000
        }
    );
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = CodecConfig::from_file(dir.path().join("absent.toml")).expect_err("missing");
    assert!(matches!(err, CodecError::Config(ref m) if m.starts_with("Failed to read config file")));
}
