use std::time::Duration;

use reqwest::{Client, Error};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

const USER_AGENT_POOL: &[&str] = &[
  DEFAULT_USER_AGENT,
  "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36",
  "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
];

pub struct HttpClient;

impl HttpClient {
  pub fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
  }

  pub fn random_user_agent() -> String {
    use rand::seq::SliceRandom;
    let mut rng = rand::thread_rng();
    USER_AGENT_POOL
      .choose(&mut rng)
      .copied()
      .unwrap_or(DEFAULT_USER_AGENT)
      .to_string()
  }

  pub fn new() -> Result<Client, Error> {
    Client::builder()
      .user_agent(Self::default_user_agent())
      .timeout(Duration::from_secs(15))
      .build()
  }
}
