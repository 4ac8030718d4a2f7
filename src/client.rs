//! Public facade: wires the transport, protocol engine, command layer, and
//! zone cache together behind a single connection object.

use std::net::ToSocketAddrs;

use log::info;

use crate::commands::{self, EventFlags, PanelDateTime, SystemPower};
use crate::engine::{ProtocolEngine, KEEP_ALIVE_IDLE};
use crate::error::TexecomError;
use crate::events::Event;
use crate::transport::SessionTransport;
use crate::zone::{PanelIdentity, ZoneCache, ZoneDescriptor};

pub struct TexecomClient {
    engine: ProtocolEngine,
    zones: ZoneCache,
    event_handler: Box<dyn FnMut(Event)>,
}

impl TexecomClient {
    /// Connects to the panel and waits out the mandatory post-connect
    /// delay. Does not log in; call `login` next. Events decoded before an
    /// event handler is registered are silently dropped.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<TexecomClient, TexecomError> {
        let transport = SessionTransport::connect(addr)?;
        Ok(TexecomClient {
            engine: ProtocolEngine::new(transport),
            zones: ZoneCache::new(),
            event_handler: Box::new(|_event| {}),
        })
    }

    /// Registers the callback invoked for every decoded event, replacing
    /// any previous handler. Must be cheap and non-blocking: it runs
    /// inline on whichever call is currently reading the socket.
    pub fn set_event_handler(&mut self, handler: impl FnMut(Event) + 'static) {
        self.event_handler = Box::new(handler);
    }

    /// Logs in with the installer/engineer/user UDL password. A rejected
    /// login (NAK) comes back as `Err(TexecomError::LoginRejected)`, not a
    /// boolean, since the caller cannot usefully proceed past it.
    pub fn login(&mut self, udl: &[u8]) -> Result<(), TexecomError> {
        commands::login(&mut self.engine, &self.zones, &mut *self.event_handler, udl)
    }

    /// Enables the given event classes. Most callers want
    /// `EventFlags::default()`.
    pub fn enable_events(&mut self, flags: EventFlags) -> Result<bool, TexecomError> {
        commands::set_event_messages(&mut self.engine, &self.zones, &mut *self.event_handler, flags)
    }

    pub fn get_date_time(&mut self) -> Result<PanelDateTime, TexecomError> {
        commands::get_date_time(&mut self.engine, &self.zones, &mut *self.event_handler)
    }

    pub fn get_lcd_display(&mut self) -> Result<String, TexecomError> {
        commands::get_lcd_display(&mut self.engine, &self.zones, &mut *self.event_handler)
    }

    pub fn get_log_pointer(&mut self) -> Result<u16, TexecomError> {
        commands::get_log_pointer(&mut self.engine, &self.zones, &mut *self.event_handler)
    }

    pub fn get_panel_identification(&mut self) -> Result<PanelIdentity, TexecomError> {
        commands::get_panel_identification(&mut self.engine, &self.zones, &mut *self.event_handler)
    }

    pub fn get_system_power(&mut self) -> Result<SystemPower, TexecomError> {
        commands::get_system_power(&mut self.engine, &self.zones, &mut *self.event_handler)
    }

    pub fn get_zone_details(&mut self, zone_number: u16) -> Result<ZoneDescriptor, TexecomError> {
        commands::get_zone_details(&mut self.engine, &self.zones, &mut *self.event_handler, zone_number)
    }

    /// Queries every zone from `1..=num_zones` and populates the cache.
    /// Returns the zones visible to a user (`zone_type != 0`).
    pub fn enumerate_zones(&mut self) -> Result<Vec<ZoneDescriptor>, TexecomError> {
        commands::enumerate_zones(&mut self.engine, &mut self.zones, &mut *self.event_handler)
    }

    pub fn zones(&self) -> &ZoneCache {
        &self.zones
    }

    /// Drives one iteration of the application event loop: reads and
    /// dispatches at most one inbound frame (returning promptly on
    /// timeout), then fires the keep-alive probe if the connection has
    /// been silent for 30 s. Call this repeatedly while awaiting events.
    pub fn poll_once(&mut self) -> Result<(), TexecomError> {
        self.engine.poll_idle(&self.zones, &mut *self.event_handler)?;
        if self.engine.idle_for() >= KEEP_ALIVE_IDLE {
            info!("30s idle, sending keep-alive probe");
            commands::get_date_time(&mut self.engine, &self.zones, &mut *self.event_handler)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }
}
