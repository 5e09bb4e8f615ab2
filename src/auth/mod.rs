mod credentials;
pub mod signature;

pub use credentials::Credentials;
pub use signature::{
    AuthorizationInfo, DATE_FORMAT, build_string_to_sign, format_date, parse_authorization_header,
    sign_request, verify_signature,
};
