mod dump1090;

pub use dump1090::{spawn_dump1090, FeedConfig};
