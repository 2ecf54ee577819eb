pub mod document;
pub mod loaders;
pub mod performance;
pub mod question;
pub mod subject;

pub use document::{DocumentInput, Payload};
pub use loaders::{load_master_topics, load_vocabulary};
pub use performance::{PerformanceData, QuestionRecord, SubjectPerformance, TopicPerformance};
pub use question::{ClassifiedQuestion, DistractorExplanation, Explanation};
pub use subject::{master_subjects, topic_key, Subject, Topic, TopicQuestion, MISCELLANEOUS};
