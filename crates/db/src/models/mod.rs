pub mod suggestion;
pub mod transcript;

pub use suggestion::SuggestionRecord;
pub use transcript::TranscriptRecord;
