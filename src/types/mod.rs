pub mod record;
pub mod sensor;
pub mod window;
