pub mod bookings;
pub mod google;
pub mod ical;
pub mod outlook;

use std::time::Duration;

use reqwest::Client;

pub use bookings::BookingsSource;
pub use google::GoogleCalendarSource;
pub use ical::IcalFeedSource;
pub use outlook::OutlookCalendarSource;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}
