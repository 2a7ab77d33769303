use crate::Error;

#[test]
fn test_taxonomy_display() {
    assert_eq!(Error::BadRequest.to_string(), "bad request");
    assert_eq!(Error::NamespaceNotFound.to_string(), "namespace not found");
    assert_eq!(Error::AlreadyExists.to_string(), "already exists");
    assert_eq!(Error::InternalServerError.to_string(), "internal server error");
    assert_eq!(Error::LimitExceeded.to_string(), "limit exceeded");
}

#[test]
fn test_codec_errors_wrap_transparently() {
    let err = bincode::deserialize::<String>(&[0xff; 9]).unwrap_err();
    let display = err.to_string();
    let wrapped: Error = err.into();
    assert!(matches!(wrapped, Error::Codec(_)));
    assert_eq!(wrapped.to_string(), display);
}

#[test]
fn test_engine_errors_carry_context() {
    let err = Error::Engine("broker gone".to_owned());
    assert_eq!(err.to_string(), "engine error: broker gone");
}
