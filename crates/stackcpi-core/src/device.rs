//! Device letter allocation
//!
//! Letter `a` belongs to the root disk. The flavor's ephemeral and swap disks
//! and a disk-mode config drive each take the next slot after it, so the
//! first letter free for data disks is `b` plus one for each reservation.

use stackcpi_cloud::Flavor;
use stackcpi_config::ConfigDrive;

/// Prefix of device paths requested on attach
pub const DEVICE_PREFIX: &str = "/dev/sd";

const KNOWN_PREFIXES: [&str; 3] = ["/dev/sd", "/dev/vd", "/dev/xvd"];
const FIRST_DATA_LETTER: u8 = b'b';
const LAST_LETTER: u8 = b'z';

/// First letter a data disk may use on a server of this flavor
pub fn first_device_letter(flavor: &Flavor, config_drive: Option<ConfigDrive>) -> char {
    let mut offset = 0;
    if flavor.has_ephemeral_disk() {
        offset += 1;
    }
    if flavor.has_swap_disk() {
        offset += 1;
    }
    if config_drive == Some(ConfigDrive::Disk) {
        offset += 1;
    }
    char::from(FIRST_DATA_LETTER + offset)
}

/// Lowest free letter at or after [`first_device_letter`], up to `z`
///
/// Returns `None` when every candidate is taken.
pub fn next_device_letter<'a, I>(
    flavor: &Flavor,
    config_drive: Option<ConfigDrive>,
    used_devices: I,
) -> Option<char>
where
    I: IntoIterator<Item = &'a str>,
{
    let used: Vec<&str> = used_devices.into_iter().map(strip_device_prefix).collect();
    let start = first_device_letter(flavor, config_drive) as u8;

    (start..=LAST_LETTER)
        .map(char::from)
        .find(|letter| !used.iter().any(|device| device.ends_with(*letter)))
}

/// Device path requested from the backend for a letter
pub fn device_path(letter: char) -> String {
    format!("{}{}", DEVICE_PREFIX, letter)
}

fn strip_device_prefix(device: &str) -> &str {
    KNOWN_PREFIXES
        .iter()
        .find_map(|prefix| device.strip_prefix(prefix))
        .unwrap_or(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flavor(ephemeral_gib: u32, swap_mib: u32) -> Flavor {
        Flavor {
            id: "f-1".to_string(),
            name: "m1.small".to_string(),
            ephemeral_gib,
            swap_mib,
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_flavor_starts_at_b() {
        assert_eq!(next_device_letter(&flavor(0, 0), None, []), Some('b'));
        assert_eq!(
            next_device_letter(&flavor(0, 0), Some(ConfigDrive::Cdrom), []),
            Some('b')
        );
    }

    #[test]
    fn test_reservations_shift_start_letter() {
        assert_eq!(next_device_letter(&flavor(10, 0), None, []), Some('c'));
        assert_eq!(next_device_letter(&flavor(10, 512), None, []), Some('d'));
        assert_eq!(
            next_device_letter(&flavor(10, 512), Some(ConfigDrive::Disk), []),
            Some('e')
        );
    }

    #[test]
    fn test_skips_used_letters_across_prefixes() {
        let used = ["/dev/sdb", "/dev/vdc", "/dev/xvdd"];
        assert_eq!(next_device_letter(&flavor(0, 0), None, used), Some('e'));
    }

    #[test]
    fn test_finds_single_gap() {
        let used: Vec<String> = ('b'..='y')
            .filter(|l| *l != 'e')
            .map(device_path)
            .collect();
        assert_eq!(used.len(), 23);

        let letter = next_device_letter(&flavor(0, 0), None, used.iter().map(String::as_str));
        assert_eq!(letter, Some('e'));
    }

    #[test]
    fn test_z_is_allocatable() {
        let used: Vec<String> = ('b'..='y').map(device_path).collect();
        let letter = next_device_letter(&flavor(0, 0), None, used.iter().map(String::as_str));
        assert_eq!(letter, Some('z'));
    }

    #[test]
    fn test_exhausted_alphabet() {
        let used: Vec<String> = ('b'..='z').map(device_path).collect();
        let letter = next_device_letter(&flavor(0, 0), None, used.iter().map(String::as_str));
        assert_eq!(letter, None);
    }

    #[test]
    fn test_device_path() {
        assert_eq!(device_path('c'), "/dev/sdc");
    }
}
