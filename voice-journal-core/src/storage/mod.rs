pub mod aes_encryptor;
pub mod artifact_file;
pub mod artifact_vault;
pub mod entry_store;
pub mod metadata;
pub mod persisted;
