//! Collection and folder settings with parent-chain inheritance

mod inheritance;
mod settings;

pub use inheritance::{
    DEFAULT_MAX_DEPTH, InheritanceChain, InheritanceResolver, ResolvedSettings, resolve_auth,
    resolve_base_url, resolve_headers, resolve_variables,
};
pub use settings::{CollectionSettings, FolderSettings, RequestSettings};
