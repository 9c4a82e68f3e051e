use crate::clients::github::GithubOps;
use crate::config::Config;

/// Everything a submission needs: settings and a way to reach GitHub.
pub struct App<G> {
    pub config: Config,
    pub gh: G,
}

impl<G: GithubOps> App<G> {
    pub fn new(config: Config, gh: G) -> Self {
        Self { config, gh }
    }
}
