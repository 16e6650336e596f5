use super::DeploymentContext;
use crate::fabric::{display_names_match, FabricApi, ItemKind};
use std::time::Duration;

pub fn poll_attempts(max_wait: Duration, interval: Duration) -> u64 {
    let interval = interval.as_secs().max(1);
    max_wait.as_secs().div_ceil(interval).max(1)
}

pub struct DeploymentPoller<'a> {
    api: &'a dyn FabricApi,
}

impl<'a> DeploymentPoller<'a> {
    pub fn new(api: &'a dyn FabricApi) -> Self {
        Self { api }
    }

    pub fn wait_for_item(
        &self,
        ctx: &DeploymentContext,
        item_name: &str,
        kind: ItemKind,
        max_wait: Duration,
        interval: Duration,
    ) -> bool {
        let attempts = poll_attempts(max_wait, interval);
        for attempt in 1..=attempts {
            match self.api.list_items(&ctx.token, &ctx.workspace_id, Some(kind)) {
                Ok(items) => {
                    if items.iter().any(|item| {
                        item.is_kind(kind) && display_names_match(&item.display_name, item_name)
                    }) {
                        ctx.log.info(
                            "poll.found",
                            &format!("{kind} `{item_name}` visible after {attempt} attempt(s)"),
                        );
                        return true;
                    }
                }
                Err(err) => ctx.log.warn(
                    "poll.error",
                    &format!("attempt {attempt}/{attempts} listing {kind} items failed: {err}"),
                ),
            }
            if attempt < attempts {
                (ctx.sleep)(interval);
            }
        }
        ctx.log.warn(
            "poll.timeout",
            &format!(
                "{kind} `{item_name}` not visible after {attempts} attempt(s) over {}s",
                max_wait.as_secs()
            ),
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_cover_the_whole_wait_window() {
        assert_eq!(poll_attempts(Duration::from_secs(60), Duration::from_secs(15)), 4);
        assert_eq!(poll_attempts(Duration::from_secs(61), Duration::from_secs(15)), 5);
        assert_eq!(poll_attempts(Duration::from_secs(0), Duration::from_secs(15)), 1);
        assert_eq!(poll_attempts(Duration::from_secs(10), Duration::from_secs(0)), 10);
    }
}
