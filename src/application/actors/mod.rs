pub mod live_feed;
