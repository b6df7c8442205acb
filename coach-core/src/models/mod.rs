pub mod reply;
pub mod session;
pub mod turn;

pub use reply::CoachReply;
pub use session::{NewSession, Session};
pub use turn::{Role, Turn};

/// Strip NUL characters, which PostgreSQL rejects in TEXT columns.
pub fn sanitize_text(text: &str) -> String {
    text.replace('\0', "")
}
