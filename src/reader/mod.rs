//! The entry reader: paging, full-text toggling and presentation of one
//! entry at a time.

mod command;
mod controller;
mod navigation;
mod platform;
mod session;
mod surface;
mod watch;

pub use command::{Direction, ReaderAction, ReaderCommand, ReaderEvent};
pub use controller::{
    EntryReader, ReaderPlatform, ReaderSettings, ReaderState, NOTICE_CANT_OPEN_LINK,
    NOTICE_NETWORK_ERROR,
};
pub use navigation::{locate, NavigationCursor};
pub use platform::{
    Connectivity, LaunchError, Launcher, NoProgress, ProgressIndicator, SystemLauncher, TcpProbe,
};
pub use session::{BrowsingState, SessionSnapshot, SESSION_KEY};
pub use surface::{DisplaySurface, HtmlBuffer, SurfaceError, SurfacePair, Transition};
pub use watch::JobWatch;
