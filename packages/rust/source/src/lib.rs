//! Reddit API client: OAuth password-grant authentication and
//! cursor-paginated retrieval of recent subreddit submissions.

mod client;

pub use client::RedditClient;
