//! [PlatformQueries] for X11 desktops. X11 has no notion of browser tabs, so browsers can only be
//! tracked by window title here.

use std::path::Path;

use async_trait::async_trait;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::instrument;
use xcb::{
    x::{self, Atom, GetProperty, InternAtom, Window, ATOM_ANY},
    Connection,
};

use super::{BrowserTab, PlatformQueries, ProbeError};

impl From<xcb::Error> for ProbeError {
    fn from(value: xcb::Error) -> Self {
        ProbeError::Query(format!("x11: {value}"))
    }
}

impl From<xcb::ConnError> for ProbeError {
    fn from(value: xcb::ConnError) -> Self {
        ProbeError::Query(format!("x11 connection: {value}"))
    }
}

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom, ProbeError> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn get_pid(conn: &Connection, window: Window, pid_atom: Atom) -> Result<Option<u32>, ProbeError> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property: pid_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    Ok(result.value::<u32>().first().copied())
}

fn get_active_window(
    conn: &Connection,
    root: Window,
    active_window_atom: Atom,
) -> Result<Window, ProbeError> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window: root,
        property: active_window_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    result
        .value::<Window>()
        .first()
        .copied()
        .ok_or(ProbeError::NoApplication)
}

fn get_name(conn: &Connection, window: Window, wm_name_atom: Atom) -> Result<String, ProbeError> {
    let wm_name = conn.wait_for_reply(conn.send_request(&x::GetProperty {
        delete: false,
        window,
        property: wm_name_atom,
        r#type: x::ATOM_ANY,
        long_offset: 0,
        long_length: 1024,
    }))?;
    Ok(String::from_utf8_lossy(wm_name.value::<u8>()).into_owned())
}

pub struct X11Queries {
    connection: Connection,
    preferred_screen: usize,
    active_window_atom: Atom,
    window_name_atom: Atom,
    pid_atom: Atom,
    system: System,
}

impl X11Queries {
    pub fn new() -> Result<Self, ProbeError> {
        let (connection, preferred_screen) = Connection::connect(None)?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let window_name_atom = intern_atom(&connection, b"_NET_WM_NAME")?;
        let pid_atom = intern_atom(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            preferred_screen: preferred_screen.max(0) as usize,
            active_window_atom,
            window_name_atom,
            pid_atom,
            system: System::new(),
        })
    }

    fn active_window(&self) -> Result<Window, ProbeError> {
        // Only a single X11 screen is supported.
        let root = self
            .connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen)
            .ok_or_else(|| ProbeError::Query("x11 screen is missing".into()))?
            .root();
        get_active_window(&self.connection, root, self.active_window_atom)
    }

    fn process_name(&mut self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_exe(sysinfo::UpdateKind::OnlyIfNotSet),
        );
        let process = self.system.process(pid)?;
        process
            .exe()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .or_else(|| Some(process.name().to_string_lossy().into_owned()))
    }
}

#[async_trait]
impl PlatformQueries for X11Queries {
    #[instrument(level = "debug", skip(self))]
    async fn foreground_application(&mut self) -> Result<String, ProbeError> {
        let window = self.active_window()?;
        let pid = get_pid(&self.connection, window, self.pid_atom)?
            .ok_or_else(|| ProbeError::Query("focused window has no _NET_WM_PID".into()))?;
        self.process_name(pid)
            .ok_or_else(|| ProbeError::Query(format!("process {pid} disappeared")))
    }

    async fn browser_tab(&mut self, _app: &str) -> Result<BrowserTab, ProbeError> {
        Err(ProbeError::Unsupported("reading browser tabs"))
    }

    #[instrument(level = "debug", skip(self))]
    async fn window_title(&mut self, _app: &str) -> Result<Option<String>, ProbeError> {
        let window = self.active_window()?;
        let name = get_name(&self.connection, window, self.window_name_atom)?;
        Ok(Some(name).filter(|name| !name.is_empty()))
    }
}
