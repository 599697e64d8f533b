//! USB identity lookup through sysfs.

/// Read USB VID:PID from sysfs for a `/dev/videoN` device.
///
/// Returns `None` if the device is not USB or sysfs is unavailable.
pub fn get_usb_ids(device_path: &str) -> Option<(u16, u16)> {
    let dev_name = std::path::Path::new(device_path).file_name()?.to_str()?;
    // /sys/class/video4linux/videoN/device links to the USB interface dir;
    // its parent is the USB device dir holding idVendor/idProduct.
    let device_link = format!("/sys/class/video4linux/{dev_name}/device");
    let interface_dir = std::fs::canonicalize(&device_link).ok()?;
    let usb_device_dir = interface_dir.parent()?;

    let vid = read_hex_id(&usb_device_dir.join("idVendor"))?;
    let pid = read_hex_id(&usb_device_dir.join("idProduct"))?;
    Some((vid, pid))
}

fn read_hex_id(path: &std::path::Path) -> Option<u16> {
    let raw = std::fs::read_to_string(path).ok()?;
    parse_hex_id(&raw)
}

fn parse_hex_id(raw: &str) -> Option<u16> {
    u16::from_str_radix(raw.trim(), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(parse_hex_id("1415\n"), Some(0x1415));
        assert_eq!(parse_hex_id("046d"), Some(0x046d));
        assert_eq!(parse_hex_id("zzzz"), None);
    }

    #[test]
    fn test_non_device_path() {
        assert_eq!(get_usb_ids("/"), None);
        assert_eq!(get_usb_ids("/dev/video-does-not-exist"), None);
    }
}
