pub mod chrome_host;
pub mod connection;

pub use chrome_host::ChromeHost;
pub use connection::connect_to_browser_and_page;
