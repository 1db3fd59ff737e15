pub mod base;
pub mod suggestion;
pub mod transcript;

pub use base::BaseDao;
pub use suggestion::SuggestionDao;
pub use transcript::TranscriptDao;
