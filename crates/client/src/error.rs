pub use duskwire_core::DuskwireError as ClientError;
