use std::io;
use std::path::PathBuf;

use kiln::error::Error;

#[test]
fn test_error_conversion() {
    let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let kiln_err: Error = io_err.into();

    match kiln_err {
        Error::Io(_) => (),
        _ => panic!("Expected Io variant"),
    }
}

#[test]
fn test_error_display() {
    let err = Error::Config("invalid config".to_string());
    assert_eq!(err.to_string(), "Configuration error: invalid config.");

    let err = Error::Tainted(PathBuf::from("/work/.secrets-updated"));
    assert_eq!(
        err.to_string(),
        "Marker file '/work/.secrets-updated' exists, repository is tainted, abort."
    );

    let err = Error::Gateway {
        command: "sops -d secrets.yaml".to_string(),
        output: "no key".to_string(),
    };
    assert_eq!(err.to_string(), "Command 'sops -d secrets.yaml' failed: no key.");
}
