pub mod asset_schema;
pub mod asset_service;
pub mod authorization;
pub mod business_service;
pub mod export_service;
pub mod import_service;
pub mod login_user_service;
pub mod project_service;
pub mod text_decoding;
pub mod tree_service;

pub use asset_service::AssetService;
pub use authorization::{ActionStatus, AuthorizationService, IdSelection};
pub use business_service::BusinessService;
pub use export_service::{ExportSelection, ExportService};
pub use import_service::{ImportService, ReconcileReport};
pub use login_user_service::LoginUserService;
pub use project_service::ProjectService;
pub use tree_service::{TreeNode, TreeService};
