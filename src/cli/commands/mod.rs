mod import;
mod init;
mod superuser;

pub use import::cmd_import_csv;
pub use init::cmd_init;
pub use superuser::cmd_create_superuser;
