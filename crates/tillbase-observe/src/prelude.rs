pub use crate::event::{ActivityEvent, ACTIVITY_DOCTYPE, SUBJECT_PREFIX};
pub use crate::feed::{
    ActivityFeed, ActivityItem, ActivityQuery, DEFAULT_ACTIVITY_LIMIT, MAX_ACTIVITY_LIMIT,
};
pub use crate::recorder::{ActivityRecorder, NullRecorder, StoreActivityRecorder};
