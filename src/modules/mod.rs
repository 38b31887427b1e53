//! Built-in dashboard modules.

pub mod calendar;
pub mod image;
pub mod weather;

pub use calendar::CalendarModule;
pub use image::ImageModule;
pub use weather::WeatherModule;
