mod answer;
mod exam;
mod ids;
mod result;
mod settings;
mod user;

pub use ids::{ExamId, ParseIdError, QuestionId, UserId};

pub use answer::{Answer, AnswerSheet};
pub use exam::{ExamDefinition, ExamDraft, ExamError, Question, QuestionDraft};
pub use result::{CompletionReason, ExamResult, ExamResultError, QuestionReview};
pub use settings::{SessionSettings, SessionSettingsDraft, SettingsError};
pub use user::{Identity, NewUser, User, UserDraft, UserError};
