use std::fmt;

use raw_window_handle::{
    HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};

/// Native window-system handle, one variant per supported platform family.
///
/// Pointers are carried as addresses so the value stays `Copy + Send` and can
/// be logged. They are only meaningful while the owning window is alive.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NativeHandle {
    /// Xlib or XCB. `display` is the `Display*` / `xcb_connection_t*`.
    X11 { display: usize, window: u64 },
    Wayland { display: usize, surface: usize },
    Cocoa { ns_view: usize },
    Win32 { hwnd: isize },
    Android { window: usize },
}

impl NativeHandle {
    /// Classifies a raw window/display handle pair.
    pub fn from_raw(
        window: RawWindowHandle,
        display: RawDisplayHandle,
    ) -> Result<Self, NativeHandleError> {
        match (window, display) {
            (RawWindowHandle::Xlib(w), RawDisplayHandle::Xlib(d)) => {
                let display = d.display.ok_or(NativeHandleError::MissingDisplay("xlib"))?;
                Ok(NativeHandle::X11 {
                    display: display.as_ptr() as usize,
                    window: w.window as u64,
                })
            }
            (RawWindowHandle::Xcb(w), RawDisplayHandle::Xcb(d)) => {
                let connection = d.connection.ok_or(NativeHandleError::MissingDisplay("xcb"))?;
                Ok(NativeHandle::X11 {
                    display: connection.as_ptr() as usize,
                    window: u64::from(w.window.get()),
                })
            }
            (RawWindowHandle::Wayland(w), RawDisplayHandle::Wayland(d)) => {
                Ok(NativeHandle::Wayland {
                    display: d.display.as_ptr() as usize,
                    surface: w.surface.as_ptr() as usize,
                })
            }
            (RawWindowHandle::AppKit(w), _) => Ok(NativeHandle::Cocoa {
                ns_view: w.ns_view.as_ptr() as usize,
            }),
            (RawWindowHandle::Win32(w), _) => Ok(NativeHandle::Win32 { hwnd: w.hwnd.get() }),
            (RawWindowHandle::AndroidNdk(w), _) => Ok(NativeHandle::Android {
                window: w.a_native_window.as_ptr() as usize,
            }),
            (window, display) => Err(NativeHandleError::Unsupported(format!(
                "{window:?} / {display:?}"
            ))),
        }
    }

    /// Short platform family name for logs.
    pub fn family(&self) -> &'static str {
        match self {
            NativeHandle::X11 { .. } => "x11",
            NativeHandle::Wayland { .. } => "wayland",
            NativeHandle::Cocoa { .. } => "cocoa",
            NativeHandle::Win32 { .. } => "win32",
            NativeHandle::Android { .. } => "android",
        }
    }
}

/// Native handle retrieval failure.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeHandleError {
    /// The windowing library could not produce a handle right now.
    Unavailable(String),
    /// The display/connection pointer was absent for a platform that needs it.
    MissingDisplay(&'static str),
    /// The handle belongs to a platform family this program does not drive.
    Unsupported(String),
}

impl fmt::Display for NativeHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeHandleError::Unavailable(e) => write!(f, "native window handle unavailable: {e}"),
            NativeHandleError::MissingDisplay(p) => write!(f, "{p} display handle is missing"),
            NativeHandleError::Unsupported(h) => write!(f, "unsupported native window handle: {h}"),
        }
    }
}

impl std::error::Error for NativeHandleError {}

impl From<HandleError> for NativeHandleError {
    fn from(err: HandleError) -> Self {
        NativeHandleError::Unavailable(err.to_string())
    }
}

/// Capability for retrieving the native window/display handle pair.
pub trait NativeHandleProvider {
    fn native_handle(&self) -> Result<NativeHandle, NativeHandleError>;
}

impl<T> NativeHandleProvider for T
where
    T: HasWindowHandle + HasDisplayHandle + ?Sized,
{
    fn native_handle(&self) -> Result<NativeHandle, NativeHandleError> {
        let window = self.window_handle()?.as_raw();
        let display = self.display_handle()?.as_raw();
        NativeHandle::from_raw(window, display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{
        AndroidDisplayHandle, AndroidNdkWindowHandle, WaylandDisplayHandle, WaylandWindowHandle,
        WebDisplayHandle, WebWindowHandle, Win32WindowHandle, WindowsDisplayHandle,
        XlibDisplayHandle, XlibWindowHandle,
    };
    use std::ffi::c_void;
    use std::num::NonZeroIsize;
    use std::ptr::NonNull;

    fn ptr(addr: usize) -> NonNull<c_void> {
        NonNull::new(addr as *mut c_void).unwrap()
    }

    #[test]
    fn xlib_maps_to_x11() {
        let w = RawWindowHandle::Xlib(XlibWindowHandle::new(42));
        let d = RawDisplayHandle::Xlib(XlibDisplayHandle::new(Some(ptr(0x1000)), 0));
        assert_eq!(
            NativeHandle::from_raw(w, d).unwrap(),
            NativeHandle::X11 { display: 0x1000, window: 42 }
        );
    }

    #[test]
    fn xlib_without_display_is_an_error() {
        let w = RawWindowHandle::Xlib(XlibWindowHandle::new(42));
        let d = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        assert_eq!(
            NativeHandle::from_raw(w, d),
            Err(NativeHandleError::MissingDisplay("xlib"))
        );
    }

    #[test]
    fn wayland_keeps_display_and_surface() {
        let w = RawWindowHandle::Wayland(WaylandWindowHandle::new(ptr(0x20)));
        let d = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(ptr(0x10)));
        let h = NativeHandle::from_raw(w, d).unwrap();
        assert_eq!(h, NativeHandle::Wayland { display: 0x10, surface: 0x20 });
        assert_eq!(h.family(), "wayland");
    }

    #[test]
    fn win32_uses_hwnd() {
        let w = RawWindowHandle::Win32(Win32WindowHandle::new(NonZeroIsize::new(7).unwrap()));
        let d = RawDisplayHandle::Windows(WindowsDisplayHandle::new());
        assert_eq!(NativeHandle::from_raw(w, d).unwrap(), NativeHandle::Win32 { hwnd: 7 });
    }

    #[test]
    fn android_uses_native_window() {
        let w = RawWindowHandle::AndroidNdk(AndroidNdkWindowHandle::new(ptr(0x30)));
        let d = RawDisplayHandle::Android(AndroidDisplayHandle::new());
        assert_eq!(
            NativeHandle::from_raw(w, d).unwrap(),
            NativeHandle::Android { window: 0x30 }
        );
    }

    #[test]
    fn web_is_unsupported() {
        let w = RawWindowHandle::Web(WebWindowHandle::new(1));
        let d = RawDisplayHandle::Web(WebDisplayHandle::new());
        assert!(matches!(
            NativeHandle::from_raw(w, d),
            Err(NativeHandleError::Unsupported(_))
        ));
    }
}
