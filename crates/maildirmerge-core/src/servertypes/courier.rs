//! Courier IMAP / POP3
//!
//! Courier keeps its bookkeeping in `courier*` files inside each folder.
//! The POP3 server maintains `courierpop3dsizelist` once a client has logged
//! in, and IMAP subscriptions are listed in `courierimapsubscribed` at the
//! account root, one `INBOX.<folder>` per line.

use super::account::AccountPath;
use super::sidefile;
use super::types::{ServerType, TypeCapability, TypeContext, TypeInfo, TypeResult};
use maildirmerge_storage::MaildirFolder;
use std::path::{Path, PathBuf};
use tracing::debug;

const UID_DB: &str = "courierimapuiddb";
const KEYWORDS_DIR: &str = "courierimapkeywords";
const SUBSCRIBED: &str = "courierimapsubscribed";
const POP3_SIZELIST: &str = "courierpop3dsizelist";

/// Courier mail server
pub struct Courier {
    info: TypeInfo,
}

impl Courier {
    pub fn new() -> Self {
        Self {
            info: TypeInfo {
                id: "courier",
                label: "Courier",
                capabilities: vec![
                    TypeCapability::Pop3State,
                    TypeCapability::QuerySubscription,
                    TypeCapability::Subscribe,
                ],
            },
        }
    }
}

impl Default for Courier {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerType for Courier {
    fn info(&self) -> &TypeInfo {
        &self.info
    }

    fn detect(&self, path: &Path) -> bool {
        [UID_DB, KEYWORDS_DIR, SUBSCRIBED, POP3_SIZELIST]
            .iter()
            .any(|name| path.join(name).exists())
    }

    fn open(&self, folder: &MaildirFolder) -> Box<dyn TypeContext> {
        Box::new(CourierContext {
            folder: folder.path().to_path_buf(),
            account: AccountPath::locate(folder.path()),
        })
    }
}

struct CourierContext {
    folder: PathBuf,
    account: AccountPath,
}

impl CourierContext {
    /// Courier names subfolders `INBOX.<name>`; on disk they are `.<name>`
    fn mailbox_name(&self, subfolder: &str) -> String {
        format!(
            "INBOX.{}",
            self.account.qualify(subfolder).trim_start_matches('.')
        )
    }

    fn subscribed_path(&self) -> PathBuf {
        self.account.root().join(SUBSCRIBED)
    }

    fn subscriptions(&self) -> TypeResult<Vec<String>> {
        let content = sidefile::read_optional(&self.subscribed_path())?;
        Ok(content
            .unwrap_or_default()
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl TypeContext for CourierContext {
    fn is_pop3(&mut self) -> bool {
        self.folder.join(POP3_SIZELIST).exists()
    }

    fn is_subscribed(&mut self, subfolder: &str) -> TypeResult<bool> {
        let mailbox = self.mailbox_name(subfolder);
        Ok(self.subscriptions()?.iter().any(|line| *line == mailbox))
    }

    fn subscribe(&mut self, subfolder: &str) -> TypeResult<()> {
        let mailbox = self.mailbox_name(subfolder);
        let mut subscriptions = self.subscriptions()?;
        if subscriptions.contains(&mailbox) {
            return Ok(());
        }

        subscriptions.push(mailbox.clone());
        let mut content = subscriptions.join("\n");
        content.push('\n');
        sidefile::replace(&self.subscribed_path(), &content)?;

        debug!(folder = %self.folder.display(), mailbox = %mailbox, "Subscribed");
        Ok(())
    }
}
