//! New-bug reporting: repeat suppression, the announced-bug marker store,
//! notification mail intake, and the periodic poller tying them together.

pub mod bug_notification;
pub mod mailbox;
pub mod new_bug_poller;
pub mod new_bug_store;
pub mod repeat_suppression;

pub use bug_notification::{parse_bug_notification, BugNotification, NotificationSkip};
pub use mailbox::{ImapMailbox, ImapMailboxConfig, Mailbox};
pub use new_bug_poller::{Announcement, NewBugPoller, PollCycleReport, PollerConfig};
pub use new_bug_store::NewBugStore;
pub use repeat_suppression::RepeatSuppressionCache;
