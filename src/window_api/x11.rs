use anyhow::{anyhow, Result};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::instrument;
use xcb::{
    x::{Atom, GetProperty, GrabServer, InternAtom, UngrabServer, Window, ATOM_ANY},
    Connection,
};

use super::ForegroundApp;

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn get_pid(conn: &Connection, window: Window, pid_atom: Atom) -> Result<Option<u32>> {
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

fn get_active_window(conn: &Connection, root: Window, active_window_atom: Atom) -> Result<Window> {
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
        .ok_or_else(|| anyhow!("_NET_ACTIVE_WINDOW is not set"))
}

pub struct X11ForegroundApp {
    connection: Connection,
    preferred_screen: usize,
    active_window_atom: Atom,
    pid_atom: Atom,
    system: System,
}

impl X11ForegroundApp {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let pid_atom = intern_atom(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            preferred_screen: preferred_screen.max(0) as usize,
            active_window_atom,
            pid_atom,
            system: System::new(),
        })
    }

    /// Name of the process, which is what the user recognizes as the application.
    fn process_name(&mut self, id: u32) -> Option<String> {
        let pid = Pid::from_u32(id);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system
            .process(pid)
            .map(|process| process.name().to_string_lossy().to_string())
    }

    fn current_inner(&mut self) -> Result<String> {
        let root = self
            .connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen)
            .ok_or_else(|| anyhow!("X11 screen {} is missing", self.preferred_screen))?
            .root();

        let active_window = get_active_window(&self.connection, root, self.active_window_atom)?;
        let pid = get_pid(&self.connection, active_window, self.pid_atom)?
            .ok_or_else(|| anyhow!("Focused window has no _NET_WM_PID"))?;
        self.process_name(pid)
            .ok_or_else(|| anyhow!("Process {pid} of the focused window is gone"))
    }
}

impl ForegroundApp for X11ForegroundApp {
    #[instrument(skip(self))]
    fn current_foreground_app(&mut self) -> Result<String> {
        let _ = self.connection.send_request(&GrabServer {});
        let result = self.current_inner();
        let _ = self.connection.send_request(&UngrabServer {});
        result
    }
}
