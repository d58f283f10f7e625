pub mod backend;
pub mod error;
pub mod models;

mod memory;
pub use memory::MemoryBackend;

pub use backend::{at_most_one, Backend};
pub use error::{Error, Result};
pub use models::{
    Affiliation, Credentials, Institution, InstitutionWithMembers, Member, Membership,
    NewAccount, Profile, ProfileUpdate, ProfileWithInstitutions, PublicField,
};
