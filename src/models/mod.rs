//! Data models
//!
//! Entities and input types shared by the policy, storage, service and API layers:
//! - Accounts and their role sets (User, Role, RoleSet, Session)
//! - Documents with classification / status / category
//! - Member directory profiles
//! - Authored-content ownership summaries

mod content;
mod document;
mod member;
mod session;
mod user;

pub use content::{ContentSummary, OwnedContent};
pub use document::{
    parse_tags, ContentStatus, CreateDocumentInput, Document, DocumentCategory,
    DocumentClassification, DocumentFilter, DocumentHeader, DocumentWithAuthor,
    UpdateDocumentInput,
};
pub use member::{
    CreateMemberInput, Member, MemberFilter, MemberProfilePatch, MemberStatus, MemberWithAccount,
    UpdateMemberInput,
};
pub use session::Session;
pub use user::{CreateUserInput, Role, RoleFilter, RoleSet, User, UserFilter};
