pub mod image;

pub use self::image::Entity as Image;
