use kernel_ipc::{CommandBuffer, ResultCode};

/// State of the plugin loader, as far as the `APT:` relay cares.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PluginLoaderStatus {
    /// A plugin is running inside the application.
    Running,
    /// The application is suspended while the HOME menu is shown.
    InHome,
    #[default]
    Idle,
}

/// Services living elsewhere in the extension that some shims hand calls
/// over to.
pub trait Collaborators {
    /// Answer a configuration request from the locale emulated for `pid`.
    /// `None` when nothing is emulated and the real service should answer.
    fn lang_emu(&self, pid: u32, cmdbuf: &mut CommandBuffer) -> Option<ResultCode>;

    /// Handle an `err:f` throw. Returns whether the call was answered.
    fn errf_throw(&self, cmdbuf: &mut CommandBuffer) -> bool;

    fn plugin_loader_status(&self) -> PluginLoaderStatus;

    /// Signal the plugin loader's HOME-menu event.
    fn signal_home_event(&self);

    /// Wake the application thread parked by the plugin loader.
    fn wake_app_thread(&self);
}
