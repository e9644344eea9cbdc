//! Unified attribute conversion for the Exif codec.

use crate::core::error::{MetaError, MetaResult};
use crate::core::metadata::{self, AttrValue};
use crate::meta::exif::tags;
use crate::meta::exif::value::{Rational, Value};
use crate::meta::exif::Exif;
use crate::meta::MetadataFormat;

impl MetadataFormat for Exif {
    fn name(&self) -> &'static str {
        crate::meta::FORMAT_EXIF
    }

    fn unmarshal(&mut self, p: &[u8]) -> MetaResult<()> {
        *self = Exif::decode(p)?;
        Ok(())
    }

    fn marshal(&self) -> MetaResult<Vec<u8>> {
        self.encode()
    }

    fn get_attr(&self, attr: &str) -> Option<AttrValue> {
        match attr {
            metadata::DATE_TIME_ORIGINAL => self
                .time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL)
                .map(AttrValue::Time),
            metadata::DATE_TIME_CREATED => self
                .time(tags::DATE_TIME_DIGITIZED, tags::SUB_SEC_TIME_DIGITIZED)
                .map(AttrValue::Time),
            metadata::GPS_DATE_TIME => self.gps_date_time().map(AttrValue::Time),
            metadata::GPS_LATITUDE => self
                .gps_coord(tags::GPS_LATITUDE, tags::GPS_LATITUDE_REF, "N", "S")
                .map(AttrValue::Real),
            metadata::GPS_LONGITUDE => self
                .gps_coord(tags::GPS_LONGITUDE, tags::GPS_LONGITUDE_REF, "E", "W")
                .map(AttrValue::Real),
            metadata::ORIENTATION => self
                .tag(tags::ORIENTATION)
                .short()
                .first()
                .map(|o| AttrValue::Int(*o as i32)),
            metadata::MAKE => self.tag(tags::MAKE).ascii().map(AttrValue::Text),
            metadata::MODEL => self.tag(tags::MODEL).ascii().map(AttrValue::Text),
            metadata::IMAGE_WIDTH => self.pixel_dimension(tags::PIXEL_X_DIMENSION),
            metadata::IMAGE_HEIGHT => self.pixel_dimension(tags::PIXEL_Y_DIMENSION),
            _ => None,
        }
    }

    fn set_attr(&mut self, attr: &str, value: &AttrValue) -> MetaResult<()> {
        match attr {
            metadata::DATE_TIME_ORIGINAL => {
                let t = expect_time(attr, value)?;
                self.set_time(tags::DATE_TIME_ORIGINAL, tags::SUB_SEC_TIME_ORIGINAL, t);
            }
            metadata::DATE_TIME_CREATED => {
                let t = expect_time(attr, value)?;
                self.set_time(tags::DATE_TIME_DIGITIZED, tags::SUB_SEC_TIME_DIGITIZED, t);
            }
            metadata::GPS_DATE_TIME => {
                let t = expect_time(attr, value)?;
                self.set_gps_date_time(t);
            }
            metadata::GPS_LATITUDE => {
                let f = expect_real(attr, value)?;
                self.set_gps_coord(tags::GPS_LATITUDE, tags::GPS_LATITUDE_REF, "N", "S", f);
            }
            metadata::GPS_LONGITUDE => {
                let f = expect_real(attr, value)?;
                self.set_gps_coord(tags::GPS_LONGITUDE, tags::GPS_LONGITUDE_REF, "E", "W", f);
            }
            metadata::ORIENTATION => {
                let i = expect_int(attr, value)?;
                self.set(tags::ORIENTATION, Value::Short(vec![i as u16]));
            }
            metadata::MAKE => {
                let s = expect_text(attr, value)?;
                self.set(tags::MAKE, Value::Ascii(s.to_string()));
            }
            metadata::MODEL => {
                let s = expect_text(attr, value)?;
                self.set(tags::MODEL, Value::Ascii(s.to_string()));
            }
            metadata::IMAGE_WIDTH => {
                let i = expect_int(attr, value)?;
                self.set(tags::PIXEL_X_DIMENSION, Value::Long(vec![i as u32]));
            }
            metadata::IMAGE_HEIGHT => {
                let i = expect_int(attr, value)?;
                self.set(tags::PIXEL_Y_DIMENSION, Value::Long(vec![i as u32]));
            }
            _ => {
                return Err(MetaError::BadValue(format!(
                    "exif: unknown attr {:?}",
                    attr
                )))
            }
        }
        Ok(())
    }

    fn delete_attr(&mut self, attr: &str) -> MetaResult<()> {
        match attr {
            metadata::DATE_TIME_ORIGINAL => {
                self.delete(tags::DATE_TIME_ORIGINAL);
                self.delete(tags::SUB_SEC_TIME_ORIGINAL);
            }
            metadata::DATE_TIME_CREATED => {
                self.delete(tags::DATE_TIME_DIGITIZED);
                self.delete(tags::SUB_SEC_TIME_DIGITIZED);
            }
            metadata::GPS_DATE_TIME => {
                self.delete(tags::GPS_DATE_STAMP);
                self.delete(tags::GPS_TIME_STAMP);
            }
            metadata::GPS_LATITUDE => {
                self.delete(tags::GPS_LATITUDE);
                self.delete(tags::GPS_LATITUDE_REF);
            }
            metadata::GPS_LONGITUDE => {
                self.delete(tags::GPS_LONGITUDE);
                self.delete(tags::GPS_LONGITUDE_REF);
            }
            metadata::ORIENTATION => self.delete(tags::ORIENTATION),
            metadata::MAKE => self.delete(tags::MAKE),
            metadata::MODEL => self.delete(tags::MODEL),
            metadata::IMAGE_WIDTH => self.delete(tags::PIXEL_X_DIMENSION),
            metadata::IMAGE_HEIGHT => self.delete(tags::PIXEL_Y_DIMENSION),
            _ => {
                return Err(MetaError::BadValue(format!(
                    "exif: unknown attr {:?}",
                    attr
                )))
            }
        }
        Ok(())
    }
}

impl Exif {
    fn gps_coord(&self, val_id: u32, ref_id: u32, pos: &str, neg: &str) -> Option<f64> {
        let sig = match self.tag(ref_id).ascii()?.as_str() {
            s if s == pos => 1.0,
            s if s == neg => -1.0,
            _ => return None,
        };
        Some(sig * self.tag(val_id).rational().degrees()?)
    }

    fn set_gps_coord(&mut self, val_id: u32, ref_id: u32, pos: &str, neg: &str, f: f64) {
        self.init_gps_version();
        let (sig, abs) = if f < 0.0 { (neg, -f) } else { (pos, f) };
        self.set(ref_id, Value::Ascii(sig.to_string()));
        self.set(val_id, Value::Rational(Rational::from_degrees(abs)));
    }

    fn pixel_dimension(&self, id: u32) -> Option<AttrValue> {
        let t = self.tag(id);
        if let Some(v) = t.long().first() {
            return Some(AttrValue::Int(*v as i32));
        }
        t.short().first().map(|v| AttrValue::Int(*v as i32))
    }
}

fn expect_time<'a>(attr: &str, v: &'a AttrValue) -> MetaResult<&'a crate::core::time::MetaTime> {
    v.as_time()
        .ok_or_else(|| MetaError::BadValue(format!("exif: attr {:?} needs a time value", attr)))
}

fn expect_real(attr: &str, v: &AttrValue) -> MetaResult<f64> {
    v.as_real()
        .ok_or_else(|| MetaError::BadValue(format!("exif: attr {:?} needs a numeric value", attr)))
}

fn expect_int(attr: &str, v: &AttrValue) -> MetaResult<i32> {
    v.as_int()
        .ok_or_else(|| MetaError::BadValue(format!("exif: attr {:?} needs an integer value", attr)))
}

fn expect_text<'a>(attr: &str, v: &'a AttrValue) -> MetaResult<&'a str> {
    v.as_text()
        .ok_or_else(|| MetaError::BadValue(format!("exif: attr {:?} needs a string value", attr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::MetaTime;

    #[test]
    fn test_attr_round_trip() {
        let mut x = Exif::new(8, 8);
        let t = MetaTime::parse("1984-02-10T22:48:56.998");

        x.set_attr(metadata::DATE_TIME_ORIGINAL, &AttrValue::Time(t))
            .unwrap();
        x.set_attr(metadata::GPS_LATITUDE, &AttrValue::Real(51.5125))
            .unwrap();
        x.set_attr(metadata::ORIENTATION, &AttrValue::Int(6)).unwrap();
        x.set_attr(metadata::MAKE, &AttrValue::Text("Acme".into()))
            .unwrap();

        let got = x.get_attr(metadata::DATE_TIME_ORIGINAL).unwrap();
        let got = got.as_time().unwrap();
        assert_eq!(got.time, t.time);
        assert_eq!(got.prec, 7);
        assert!(got.offset.is_none());

        assert_eq!(
            x.get_attr(metadata::GPS_LATITUDE).and_then(|v| v.as_real()),
            Some(51.5125)
        );
        assert_eq!(
            x.get_attr(metadata::ORIENTATION).and_then(|v| v.as_int()),
            Some(6)
        );
        assert_eq!(
            x.get_attr(metadata::IMAGE_WIDTH).and_then(|v| v.as_int()),
            Some(8)
        );
    }

    #[test]
    fn test_orientation_routed_to_orientation() {
        let mut x = Exif::new(8, 8);
        x.set(tags::ORIENTATION, Value::Short(vec![3]));
        assert_eq!(
            x.get_attr(metadata::ORIENTATION).and_then(|v| v.as_int()),
            Some(3)
        );
        assert_eq!(x.get_attr(metadata::MAKE), None);
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let mut x = Exif::new(8, 8);
        let err = x
            .set_attr(metadata::ORIENTATION, &AttrValue::Text("6".into()))
            .unwrap_err();
        assert!(matches!(err, MetaError::BadValue(_)));

        let err = x
            .set_attr("NoSuchAttr", &AttrValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, MetaError::BadValue(_)));
    }

    #[test]
    fn test_delete_attr() {
        let mut x = Exif::new(8, 8);
        x.set_attr(metadata::GPS_LATITUDE, &AttrValue::Real(51.5125))
            .unwrap();
        x.delete_attr(metadata::GPS_LATITUDE).unwrap();
        assert_eq!(x.get_attr(metadata::GPS_LATITUDE), None);
        assert!(x.tag(tags::GPS_LATITUDE_REF).ascii().is_none());
    }
}
