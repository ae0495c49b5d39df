pub mod http_session_reporter;
pub mod periodic_reporter;
