//! C ABI for the SVS control channel.
//!
//! Each control message handler on the C side maps onto one function here.
//! Address families use the control-channel encoding (`0` IPv4, `1` IPv6)
//! and interfaces are raw software interface indexes. Every function
//! returns `SVS_STATUS_OK` or a negative status code.

use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr};

use svs_types::{AddressFamily, InterfaceId, IpPrefix, TableId};
use tracing::debug;

use super::orch::{SvsOrch, SvsOrchError};
use super::types::{
    SVS_PLUGIN_VERSION_MAJOR, SVS_PLUGIN_VERSION_MINOR, SVS_STATUS_BUSY,
    SVS_STATUS_INVALID_ADDRESS_FAMILY, SVS_STATUS_INVALID_INTERFACE, SVS_STATUS_INVALID_PREFIX,
    SVS_STATUS_NOT_REGISTERED, SVS_STATUS_OK,
};

thread_local! {
    static SVS_ORCH: RefCell<Option<Box<SvsOrch>>> = const { RefCell::new(None) };
}

/// Callback invoked once per binding by [`rust_svs_dump`].
pub type SvsDumpCallback =
    extern "C" fn(af: u8, table_id: u32, sw_if_index: u32, context: *mut c_void);

/// Registers the SvsOrch instance serving the C boundary on this thread.
pub fn register_svs_orch(orch: Box<SvsOrch>) {
    SVS_ORCH.with(|cell| {
        *cell.borrow_mut() = Some(orch);
    });
}

/// Unregisters and returns the instance, if any.
pub fn unregister_svs_orch() -> Option<Box<SvsOrch>> {
    SVS_ORCH.with(|cell| cell.borrow_mut().take())
}

fn status(result: Result<(), SvsOrchError>) -> i32 {
    match result {
        Ok(()) => SVS_STATUS_OK,
        Err(e) => e.status_code(),
    }
}

/// Runs `f` against the registered instance.
///
/// A call made while the instance is already borrowed (a handler invoked
/// from a dump or orch callback) gets `SVS_STATUS_BUSY`.
fn with_orch_mut<F>(f: F) -> i32
where
    F: FnOnce(&mut SvsOrch) -> i32,
{
    SVS_ORCH.with(|cell| {
        let Ok(mut orch) = cell.try_borrow_mut() else {
            debug!("Rejected re-entrant SVS call");
            return SVS_STATUS_BUSY;
        };
        match orch.as_mut() {
            Some(orch) => f(orch),
            None => SVS_STATUS_NOT_REGISTERED,
        }
    })
}

#[no_mangle]
pub extern "C" fn rust_svs_orch_is_registered() -> bool {
    // Borrowed means a handler is running against a registered instance.
    SVS_ORCH.with(|cell| cell.try_borrow().map_or(true, |orch| orch.is_some()))
}

/// Writes the interface version.
///
/// # Safety
///
/// - `major` and `minor` must each be null or valid for a `u32` write
#[no_mangle]
pub unsafe extern "C" fn rust_svs_plugin_get_version(major: *mut u32, minor: *mut u32) -> i32 {
    if let Some(major) = major.as_mut() {
        *major = SVS_PLUGIN_VERSION_MAJOR;
    }
    if let Some(minor) = minor.as_mut() {
        *minor = SVS_PLUGIN_VERSION_MINOR;
    }
    SVS_STATUS_OK
}

/// Creates (`is_add`) or deletes an SVS table.
#[no_mangle]
pub extern "C" fn rust_svs_table_add_del(is_add: bool, af: u8, table_id: TableId) -> i32 {
    let Ok(af) = AddressFamily::from_api(af) else {
        return SVS_STATUS_INVALID_ADDRESS_FAMILY;
    };
    with_orch_mut(|orch| {
        status(if is_add {
            orch.table_add(af, table_id)
        } else {
            orch.table_delete(af, table_id)
        })
    })
}

/// Adds or deletes a source-prefix route in an SVS table.
///
/// `prefix` is CIDR text (`10.0.0.0/8`, `2001:db8::/32`); the table's
/// address family is taken from it. `source_table_id` is ignored on delete.
///
/// # Safety
///
/// - `prefix` must be a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn rust_svs_route_add_del(
    is_add: bool,
    table_id: TableId,
    prefix: *const c_char,
    source_table_id: TableId,
) -> i32 {
    if prefix.is_null() {
        return SVS_STATUS_INVALID_PREFIX;
    }
    let prefix: IpPrefix = match CStr::from_ptr(prefix).to_str().map(str::parse::<IpPrefix>) {
        Ok(Ok(prefix)) => prefix,
        _ => {
            debug!("Rejected malformed SVS route prefix");
            return SVS_STATUS_INVALID_PREFIX;
        }
    };
    with_orch_mut(|orch| {
        status(if is_add {
            orch.route_add(table_id, prefix, source_table_id)
        } else {
            orch.route_delete(table_id, prefix)
        })
    })
}

/// Enables or disables source selection on an interface.
///
/// The interface index is validated before the address family. An
/// interface that was removed while bound still passes, so its binding can
/// be disabled. `table_id` is ignored on disable.
#[no_mangle]
pub extern "C" fn rust_svs_enable_disable(
    is_enable: bool,
    af: u8,
    table_id: TableId,
    sw_if_index: u32,
) -> i32 {
    let interface = InterfaceId::new(sw_if_index);
    with_orch_mut(|orch| {
        if !orch.knows_interface(interface) {
            return SVS_STATUS_INVALID_INTERFACE;
        }
        let Ok(af) = AddressFamily::from_api(af) else {
            return SVS_STATUS_INVALID_ADDRESS_FAMILY;
        };
        status(if is_enable {
            orch.enable(af, table_id, interface)
        } else {
            orch.disable(af, interface)
        })
    })
}

/// Streams every binding to `callback`.
///
/// Returns the number of records sent, or a negative status code. The
/// callback may not mutate SVS state; handlers it calls return
/// `SVS_STATUS_BUSY`.
///
/// # Safety
///
/// - `context` is passed through untouched; the callback must accept it
#[no_mangle]
pub unsafe extern "C" fn rust_svs_dump(
    callback: Option<SvsDumpCallback>,
    context: *mut c_void,
) -> i32 {
    SVS_ORCH.with(|cell| {
        let Ok(orch) = cell.try_borrow() else {
            return SVS_STATUS_BUSY;
        };
        let Some(orch) = orch.as_ref() else {
            return SVS_STATUS_NOT_REGISTERED;
        };
        let mut sent: i32 = 0;
        for details in orch.walk() {
            if let Some(callback) = callback {
                callback(
                    details.af.to_api(),
                    details.table_id,
                    details.interface.as_u32(),
                    context,
                );
            }
            sent = sent.saturating_add(1);
        }
        sent
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intfs::{IntfsEntry, IntfsOrch, IntfsOrchConfig};
    use crate::svs::orch::SvsOrchConfig;
    use crate::svs::types::{SVS_STATUS_ALREADY_EXISTS, SVS_STATUS_IN_USE, SVS_STATUS_NOT_FOUND};
    use pretty_assertions::assert_eq;
    use std::ffi::CString;
    use std::ptr;
    use std::sync::Arc;

    fn register() -> Arc<IntfsOrch> {
        let intfs = Arc::new(IntfsOrch::new(IntfsOrchConfig::default()));
        intfs
            .add_interface(IntfsEntry::new(InterfaceId::new(1), "Ethernet0"))
            .unwrap();
        intfs
            .add_interface(IntfsEntry::new(InterfaceId::new(2), "Ethernet4"))
            .unwrap();
        register_svs_orch(Box::new(SvsOrch::new(SvsOrchConfig::new(8), intfs.clone())));
        intfs
    }

    fn route(is_add: bool, table_id: u32, prefix: &str, target: u32) -> i32 {
        let prefix = CString::new(prefix).unwrap();
        unsafe { rust_svs_route_add_del(is_add, table_id, prefix.as_ptr(), target) }
    }

    extern "C" fn collect(af: u8, table_id: u32, sw_if_index: u32, context: *mut c_void) {
        let records = unsafe { &mut *(context as *mut Vec<(u8, u32, u32)>) };
        records.push((af, table_id, sw_if_index));
    }

    /// Tries to mutate from inside a dump and records what came back.
    extern "C" fn reenter(_af: u8, _table_id: u32, _sw_if_index: u32, context: *mut c_void) {
        let codes = unsafe { &mut *(context as *mut Vec<i32>) };
        codes.push(rust_svs_table_add_del(true, 0, 99));
        codes.push(rust_svs_enable_disable(false, 0, 0, 1));
        codes.push(rust_svs_orch_is_registered() as i32);
    }

    #[test]
    fn test_register_unregister() {
        unregister_svs_orch();
        assert!(!rust_svs_orch_is_registered());
        assert_eq!(rust_svs_table_add_del(true, 0, 7), SVS_STATUS_NOT_REGISTERED);

        register();
        assert!(rust_svs_orch_is_registered());
        assert!(unregister_svs_orch().is_some());
        assert!(!rust_svs_orch_is_registered());
    }

    #[test]
    fn test_version() {
        let mut major = 0;
        let mut minor = 9;
        let rc = unsafe { rust_svs_plugin_get_version(&mut major, &mut minor) };
        assert_eq!(rc, SVS_STATUS_OK);
        assert_eq!((major, minor), (1, 0));
        assert_eq!(
            unsafe { rust_svs_plugin_get_version(ptr::null_mut(), ptr::null_mut()) },
            SVS_STATUS_OK
        );
    }

    #[test]
    fn test_table_status_codes() {
        register();
        assert_eq!(rust_svs_table_add_del(true, 0, 7), SVS_STATUS_OK);
        assert_eq!(rust_svs_table_add_del(true, 0, 7), SVS_STATUS_ALREADY_EXISTS);
        assert_eq!(rust_svs_table_add_del(true, 2, 7), SVS_STATUS_INVALID_ADDRESS_FAMILY);
        assert_eq!(rust_svs_table_add_del(false, 1, 7), SVS_STATUS_NOT_FOUND);

        assert_eq!(rust_svs_enable_disable(true, 0, 7, 1), SVS_STATUS_OK);
        assert_eq!(rust_svs_table_add_del(false, 0, 7), SVS_STATUS_IN_USE);
        unregister_svs_orch();
    }

    #[test]
    fn test_route_status_codes() {
        register();
        assert_eq!(route(true, 7, "10.0.0.0/8", 100), SVS_STATUS_NOT_FOUND);
        rust_svs_table_add_del(true, 0, 7);
        assert_eq!(route(true, 7, "10.0.0.0/8", 100), SVS_STATUS_OK);
        assert_eq!(route(true, 7, "10.0.0.0/33", 100), SVS_STATUS_INVALID_PREFIX);
        assert_eq!(route(false, 7, "10.0.0.0/16", 0), SVS_STATUS_NOT_FOUND);
        assert_eq!(route(false, 7, "10.0.0.0/8", 0), SVS_STATUS_OK);
        assert_eq!(
            unsafe { rust_svs_route_add_del(true, 7, ptr::null(), 1) },
            SVS_STATUS_INVALID_PREFIX
        );
        unregister_svs_orch();
    }

    #[test]
    fn test_enable_disable_status_codes() {
        register();
        rust_svs_table_add_del(true, 0, 7);
        assert_eq!(rust_svs_enable_disable(true, 0, 7, 5), SVS_STATUS_INVALID_INTERFACE);
        assert_eq!(rust_svs_enable_disable(true, 0, 8, 1), SVS_STATUS_NOT_FOUND);
        assert_eq!(rust_svs_enable_disable(false, 0, 0, 1), SVS_STATUS_NOT_FOUND);
        assert_eq!(rust_svs_enable_disable(true, 0, 7, 1), SVS_STATUS_OK);
        assert_eq!(rust_svs_enable_disable(false, 0, 0, 1), SVS_STATUS_OK);
        unregister_svs_orch();
    }

    #[test]
    fn test_interface_checked_before_address_family() {
        register();
        assert_eq!(rust_svs_enable_disable(true, 2, 7, 5), SVS_STATUS_INVALID_INTERFACE);
        assert_eq!(rust_svs_enable_disable(false, 2, 0, 5), SVS_STATUS_INVALID_INTERFACE);
        assert_eq!(rust_svs_enable_disable(true, 2, 7, 1), SVS_STATUS_INVALID_ADDRESS_FAMILY);
        unregister_svs_orch();
    }

    #[test]
    fn test_disable_removed_interface() {
        let intfs = register();
        rust_svs_table_add_del(true, 0, 7);
        assert_eq!(rust_svs_enable_disable(true, 0, 7, 1), SVS_STATUS_OK);
        intfs.remove_interface(InterfaceId::new(1)).unwrap();

        assert_eq!(rust_svs_table_add_del(false, 0, 7), SVS_STATUS_IN_USE);
        assert_eq!(rust_svs_enable_disable(false, 0, 0, 1), SVS_STATUS_OK);
        assert_eq!(rust_svs_table_add_del(false, 0, 7), SVS_STATUS_OK);
        assert_eq!(rust_svs_enable_disable(false, 0, 0, 1), SVS_STATUS_INVALID_INTERFACE);
        unregister_svs_orch();
    }

    #[test]
    fn test_dump_callback_cannot_reenter() {
        register();
        rust_svs_table_add_del(true, 0, 7);
        rust_svs_enable_disable(true, 0, 7, 1);

        let mut codes: Vec<i32> = Vec::new();
        let sent = unsafe { rust_svs_dump(Some(reenter), &mut codes as *mut Vec<i32> as *mut c_void) };
        assert_eq!(sent, 1);
        assert_eq!(codes, vec![SVS_STATUS_BUSY, SVS_STATUS_BUSY, 1]);

        // Nothing changed, and the instance is usable again once the dump ends.
        assert_eq!(rust_svs_table_add_del(false, 0, 99), SVS_STATUS_NOT_FOUND);
        assert_eq!(rust_svs_enable_disable(false, 0, 0, 1), SVS_STATUS_OK);
        unregister_svs_orch();
    }

    #[test]
    fn test_dump() {
        register();
        rust_svs_table_add_del(true, 0, 7);
        rust_svs_table_add_del(true, 1, 9);
        rust_svs_enable_disable(true, 1, 9, 1);
        rust_svs_enable_disable(true, 0, 7, 2);

        let mut records: Vec<(u8, u32, u32)> = Vec::new();
        let sent = unsafe {
            rust_svs_dump(Some(collect), &mut records as *mut Vec<(u8, u32, u32)> as *mut c_void)
        };
        assert_eq!(sent, 2);
        assert_eq!(records, vec![(0, 7, 2), (1, 9, 1)]);

        assert_eq!(unsafe { rust_svs_dump(None, ptr::null_mut()) }, 2);
        unregister_svs_orch();
        assert_eq!(
            unsafe { rust_svs_dump(None, ptr::null_mut()) },
            SVS_STATUS_NOT_REGISTERED
        );
    }
}
