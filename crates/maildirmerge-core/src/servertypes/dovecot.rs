//! Dovecot
//!
//! Dovecot tracks IMAP UIDs in `dovecot-uidlist` (version 3 layout):
//!
//! ```text
//! 3 V1275660208 N25022 G3085f01b7f11094c501100008c4a11c1
//! 25006 W2048 P1d6b8b1a :1276528487.M364837P9451.kurkku,S=1234
//! ```
//!
//! The header carries the UID validity (`V`) and next UID (`N`). Each record
//! is a UID, optional extension fields and the message base name after ` :`.
//! A `P` extension holds the POP3 UIDL. Subscriptions are listed in the
//! `subscriptions` file at the account root.

use super::account::AccountPath;
use super::sidefile;
use super::types::{
    ServerType, TypeCapability, TypeContext, TypeError, TypeInfo, TypeResult,
};
use maildirmerge_storage::MaildirFolder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const UIDLIST: &str = "dovecot-uidlist";
const UIDLIST_LOCK: &str = "dovecot-uidlist.lock";
const INDEX: &str = "dovecot.index";
const SUBSCRIPTIONS: &str = "subscriptions";

/// Dovecot mail server
pub struct Dovecot {
    info: TypeInfo,
}

impl Dovecot {
    pub fn new() -> Self {
        Self {
            info: TypeInfo {
                id: "dovecot",
                label: "Dovecot",
                capabilities: vec![
                    TypeCapability::GetUidl,
                    TypeCapability::SetUidl,
                    TypeCapability::QuerySubscription,
                    TypeCapability::Subscribe,
                ],
            },
        }
    }
}

impl Default for Dovecot {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerType for Dovecot {
    fn info(&self) -> &TypeInfo {
        &self.info
    }

    fn detect(&self, path: &Path) -> bool {
        path.join(UIDLIST).exists() || path.join(INDEX).exists()
    }

    fn open(&self, folder: &MaildirFolder) -> Box<dyn TypeContext> {
        Box::new(DovecotContext {
            folder: folder.path().to_path_buf(),
            account: AccountPath::locate(folder.path()),
            uidlist: None,
            pending: Vec::new(),
        })
    }
}

/// One message record of the uidlist
#[derive(Debug, Clone, PartialEq, Eq)]
struct UidRecord {
    uid: u32,
    extensions: Vec<String>,
    base_name: String,
}

impl UidRecord {
    fn pop3_uidl(&self) -> Option<&str> {
        self.extensions.iter().find_map(|ext| ext.strip_prefix('P'))
    }

    fn set_pop3_uidl(&mut self, uidl: &str) {
        self.extensions.retain(|ext| !ext.starts_with('P'));
        self.extensions.push(format!("P{}", uidl));
    }
}

/// Parsed `dovecot-uidlist`
#[derive(Debug, Clone, PartialEq, Eq)]
struct UidList {
    header: Vec<String>,
    records: Vec<UidRecord>,
}

impl UidList {
    fn parse(path: &Path, content: &str) -> TypeResult<Self> {
        let mut lines = content.lines();
        let header: Vec<String> = lines
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        match header.first().map(String::as_str) {
            Some("3") => {}
            Some(version) => {
                return Err(TypeError::format(
                    path,
                    format!("unsupported uidlist version {}", version),
                ))
            }
            None => return Err(TypeError::format(path, "empty uidlist")),
        }

        let mut records = Vec::new();
        for line in lines.filter(|line| !line.trim().is_empty()) {
            let (fields, base_name) = line
                .split_once(" :")
                .ok_or_else(|| TypeError::format(path, format!("malformed record: {}", line)))?;
            let mut fields = fields.split_whitespace();
            let uid = fields
                .next()
                .and_then(|uid| uid.parse().ok())
                .ok_or_else(|| TypeError::format(path, format!("malformed uid: {}", line)))?;

            records.push(UidRecord {
                uid,
                extensions: fields.map(str::to_string).collect(),
                base_name: base_name.to_string(),
            });
        }

        Ok(Self { header, records })
    }

    /// UID for the next appended record, `None` once the UID space is used up
    fn next_uid(&self) -> Option<u32> {
        let from_header = self
            .header
            .iter()
            .find_map(|field| field.strip_prefix('N'))
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        let from_records = match self.records.iter().map(|r| r.uid).max() {
            Some(uid) => uid.checked_add(1)?,
            None => 1,
        };
        Some(from_header.max(from_records))
    }

    fn find(&self, base_name: &str) -> Option<&UidRecord> {
        self.records.iter().find(|r| r.base_name == base_name)
    }

    /// Set the UIDL of a record, adding a record when the message is unknown
    fn set_pop3_uidl(&mut self, path: &Path, base_name: &str, uidl: &str) -> TypeResult<()> {
        if let Some(record) = self.records.iter_mut().find(|r| r.base_name == base_name) {
            record.set_pop3_uidl(uidl);
            return Ok(());
        }

        let (uid, next_uid) = self
            .next_uid()
            .and_then(|uid| Some((uid, uid.checked_add(1)?)))
            .ok_or_else(|| TypeError::format(path, "no UIDs left for a new record"))?;
        self.records.push(UidRecord {
            uid,
            extensions: vec![format!("P{}", uidl)],
            base_name: base_name.to_string(),
        });

        let next = format!("N{}", next_uid);
        match self.header.iter_mut().find(|field| field.starts_with('N')) {
            Some(field) => *field = next,
            None => self.header.push(next),
        }
        Ok(())
    }

    fn render(&self) -> String {
        let mut out = self.header.join(" ");
        out.push('\n');
        for record in &self.records {
            out.push_str(&record.uid.to_string());
            for ext in &record.extensions {
                out.push(' ');
                out.push_str(ext);
            }
            out.push_str(" :");
            out.push_str(&record.base_name);
            out.push('\n');
        }
        out
    }
}

struct DovecotContext {
    folder: PathBuf,
    account: AccountPath,
    uidlist: Option<UidList>,
    /// UIDLs to write when the context is closed
    pending: Vec<(String, String)>,
}

impl DovecotContext {
    fn load_uidlist(&self) -> TypeResult<Option<UidList>> {
        let path = self.folder.join(UIDLIST);
        sidefile::read_optional(&path)?
            .map(|content| UidList::parse(&path, &content))
            .transpose()
    }

    /// Subscription entries name folders without the leading dot
    fn subscription_name(&self, subfolder: &str) -> String {
        self.account
            .qualify(subfolder)
            .trim_start_matches('.')
            .to_string()
    }

    fn subscriptions_path(&self) -> PathBuf {
        self.account.root().join(SUBSCRIPTIONS)
    }

    /// Subscription entries, and whether the file uses the tab-separated
    /// version 2 layout
    fn subscriptions(&self) -> TypeResult<(Vec<String>, bool)> {
        let content =
            sidefile::read_optional(&self.subscriptions_path())?.unwrap_or_default();
        let mut lines = content.lines().peekable();
        let v2 = lines.peek().is_some_and(|line| line.starts_with("V\t"));
        if v2 {
            lines.next();
        }

        let names = lines
            .filter(|line| !line.is_empty())
            .map(|line| line.replace('\t', "."))
            .collect();
        Ok((names, v2))
    }
}

impl TypeContext for DovecotContext {
    fn pop3_uidl(&mut self, base_name: &str) -> TypeResult<Option<String>> {
        if self.uidlist.is_none() {
            self.uidlist = self.load_uidlist()?;
        }

        Ok(self
            .uidlist
            .as_ref()
            .and_then(|list| list.find(base_name))
            .and_then(UidRecord::pop3_uidl)
            .map(str::to_string))
    }

    fn set_pop3_uidl(&mut self, base_name: &str, uidl: &str) -> TypeResult<()> {
        self.pending.push((base_name.to_string(), uidl.to_string()));
        Ok(())
    }

    fn is_subscribed(&mut self, subfolder: &str) -> TypeResult<bool> {
        let name = self.subscription_name(subfolder);
        Ok(self.subscriptions()?.0.contains(&name))
    }

    fn subscribe(&mut self, subfolder: &str) -> TypeResult<()> {
        let name = self.subscription_name(subfolder);
        let (mut names, v2) = self.subscriptions()?;
        if names.contains(&name) {
            return Ok(());
        }
        names.push(name);

        let mut content = String::new();
        if v2 {
            content.push_str("V\t2\n\n");
        }
        for entry in &names {
            if v2 {
                content.push_str(&entry.replace('.', "\t"));
            } else {
                content.push_str(entry);
            }
            content.push('\n');
        }
        sidefile::replace(&self.subscriptions_path(), &content)?;

        debug!(folder = %self.folder.display(), subfolder, "Subscribed");
        Ok(())
    }

    /// Write pending UIDLs while holding Dovecot's dotlock.
    ///
    /// The uidlist is re-read under the lock, and the new content is written
    /// to the lock file and renamed over the uidlist, as Dovecot does.
    fn close(self: Box<Self>) -> TypeResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let path = self.folder.join(UIDLIST);
        let lock_path = self.folder.join(UIDLIST_LOCK);

        let mut list = match self.load_uidlist()? {
            Some(list) => list,
            None => UidList {
                header: vec!["3".to_string(), "V1".to_string(), "N1".to_string()],
                records: Vec::new(),
            },
        };
        for (base_name, uidl) in &self.pending {
            list.set_pop3_uidl(&path, base_name, uidl)?;
        }

        sidefile::write_new(&lock_path, &list.render()).map_err(|e| match e {
            TypeError::Io { ref source, .. }
                if source.kind() == std::io::ErrorKind::AlreadyExists =>
            {
                TypeError::Locked(path.display().to_string())
            }
            other => other,
        })?;

        if let Err(e) = fs::rename(&lock_path, &path) {
            let _ = fs::remove_file(&lock_path);
            return Err(TypeError::io(&path, e));
        }

        info!(path = %path.display(), count = self.pending.len(), "Stored POP3 UIDLs");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = "3 V1275660208 N25022 G3085f01b7f11094c501100008c4a11c1\n\
                          25006 W2048 P1d6b8b1a :1276528487.M364837P9451.kurkku,S=1234\n\
                          25007 :1276528488.M1P2.kurkku\n";

    fn open(path: &Path) -> Box<dyn TypeContext> {
        Dovecot::new().open(&MaildirFolder::open(path).unwrap())
    }

    #[test]
    fn test_detect() {
        let temp_dir = TempDir::new().unwrap();
        let dovecot = Dovecot::new();
        assert!(!dovecot.detect(temp_dir.path()));

        fs::write(temp_dir.path().join(UIDLIST), SAMPLE).unwrap();
        assert!(dovecot.detect(temp_dir.path()));
    }

    #[test]
    fn test_parse_uidlist() {
        let list = UidList::parse(Path::new("uidlist"), SAMPLE).unwrap();
        assert_eq!(list.records.len(), 2);
        assert_eq!(list.next_uid(), Some(25022));
        assert_eq!(
            list.find("1276528487.M364837P9451.kurkku,S=1234")
                .and_then(UidRecord::pop3_uidl),
            Some("1d6b8b1a")
        );
        assert_eq!(
            list.find("1276528488.M1P2.kurkku")
                .and_then(UidRecord::pop3_uidl),
            None
        );
        assert_eq!(list.render(), SAMPLE);
    }

    #[test]
    fn test_exhausted_uid_space() {
        let content = "3 V1 N5\n4294967295 :full\n";
        let mut list = UidList::parse(Path::new("uidlist"), content).unwrap();
        assert_eq!(list.next_uid(), None);

        // known messages can still be updated
        list.set_pop3_uidl(Path::new("uidlist"), "full", "abc").unwrap();
        assert_eq!(list.render(), "3 V1 N5\n4294967295 Pabc :full\n");

        let err = list
            .set_pop3_uidl(Path::new("uidlist"), "another", "def")
            .unwrap_err();
        assert!(matches!(err, TypeError::Format { .. }));
    }

    #[test]
    fn test_old_uidlist_version_is_rejected() {
        let err = UidList::parse(Path::new("uidlist"), "1 1275660208 25\n25 msg\n").unwrap_err();
        assert!(matches!(err, TypeError::Format { .. }));
    }

    #[test]
    fn test_get_uidl() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(UIDLIST), SAMPLE).unwrap();
        let mut ctx = open(temp_dir.path());

        assert_eq!(
            ctx.pop3_uidl("1276528487.M364837P9451.kurkku,S=1234").unwrap(),
            Some("1d6b8b1a".to_string())
        );
        assert_eq!(ctx.pop3_uidl("unknown").unwrap(), None);
    }

    #[test]
    fn test_set_uidl_is_written_on_close() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(UIDLIST), SAMPLE).unwrap();
        let mut ctx = open(temp_dir.path());

        ctx.set_pop3_uidl("1276528488.M1P2.kurkku", "abc").unwrap();
        ctx.set_pop3_uidl("1300000000.M9P9.other", "def").unwrap();
        // nothing is written before close
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(UIDLIST)).unwrap(),
            SAMPLE
        );

        ctx.close().unwrap();

        assert_eq!(
            fs::read_to_string(temp_dir.path().join(UIDLIST)).unwrap(),
            "3 V1275660208 N25023 G3085f01b7f11094c501100008c4a11c1\n\
             25006 W2048 P1d6b8b1a :1276528487.M364837P9451.kurkku,S=1234\n\
             25007 Pabc :1276528488.M1P2.kurkku\n\
             25022 Pdef :1300000000.M9P9.other\n"
        );
        assert!(!temp_dir.path().join(UIDLIST_LOCK).exists());
    }

    #[test]
    fn test_close_respects_lock() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(UIDLIST), SAMPLE).unwrap();
        fs::write(temp_dir.path().join(UIDLIST_LOCK), "").unwrap();
        let mut ctx = open(temp_dir.path());

        ctx.set_pop3_uidl("1276528488.M1P2.kurkku", "abc").unwrap();
        assert!(matches!(ctx.close(), Err(TypeError::Locked(_))));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(UIDLIST)).unwrap(),
            SAMPLE
        );
    }

    #[test]
    fn test_close_without_changes_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = open(temp_dir.path());
        ctx.close().unwrap();
        assert!(!temp_dir.path().join(UIDLIST).exists());
    }

    #[test]
    fn test_subscriptions_plain() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SUBSCRIPTIONS), "Sent\n").unwrap();
        let mut ctx = open(temp_dir.path());

        assert!(ctx.is_subscribed(".Sent").unwrap());
        ctx.subscribe(".Archive.2024").unwrap();
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(SUBSCRIPTIONS)).unwrap(),
            "Sent\nArchive.2024\n"
        );
    }

    #[test]
    fn test_subscriptions_v2() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SUBSCRIPTIONS), "V\t2\n\nSent\nArchive\t2023\n").unwrap();
        let mut ctx = open(temp_dir.path());

        assert!(ctx.is_subscribed(".Archive.2023").unwrap());
        assert!(!ctx.is_subscribed(".Archive").unwrap());

        ctx.subscribe(".Archive").unwrap();
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(SUBSCRIPTIONS)).unwrap(),
            "V\t2\n\nSent\nArchive\t2023\nArchive\n"
        );
    }

    #[test]
    fn test_subfolder_subscriptions_use_account_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("cur")).unwrap();
        fs::write(temp_dir.path().join(SUBSCRIPTIONS), "V\t2\n\nArchive\t2023\n").unwrap();
        let archive = temp_dir.path().join(".Archive");
        fs::create_dir(&archive).unwrap();
        let mut ctx = open(&archive);

        assert!(ctx.is_subscribed(".2023").unwrap());
        assert!(!ctx.is_subscribed(".2024").unwrap());
        ctx.subscribe(".2024").unwrap();

        assert_eq!(
            fs::read_to_string(temp_dir.path().join(SUBSCRIPTIONS)).unwrap(),
            "V\t2\n\nArchive\t2023\nArchive\t2024\n"
        );
        assert!(!archive.join(SUBSCRIPTIONS).exists());
    }
}
