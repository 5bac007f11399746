//! FTP response handling
//!
//! Defines the response codes the engine emits and line formatting.

pub const TRANSFER_OPEN: u16 = 150;
pub const OK: u16 = 200;
pub const FEATURES: u16 = 211;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const TRANSFER_CLOSE: u16 = 226;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_INFO: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const NEED_MORE_INFO: u16 = 350;
pub const SERVICE_NOT_AVAILABLE: u16 = 421;
pub const UNKNOWN_COMMAND: u16 = 500;
pub const INTERNAL_ERROR: u16 = 500;
pub const SYNTAX_ERROR: u16 = 501;
pub const NOT_IMPLEMENTED: u16 = 502;
pub const BAD_SEQUENCE: u16 = 503;
pub const UNSUPPORTED_PARAMETER: u16 = 504;
pub const NOT_LOGGED_IN: u16 = 530;
pub const ACTION_NOT_TAKEN: u16 = 550;

/// Formats one complete response line, CRLF included.
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

#[cfg(test)]
mod tests {
    use super::format_response;

    #[test]
    fn response_line_is_crlf_terminated() {
        assert_eq!(format_response(220, "Welcome"), "220 Welcome\r\n");
    }
}
