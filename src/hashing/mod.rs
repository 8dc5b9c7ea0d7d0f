pub mod key_hasher;
