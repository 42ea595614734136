//! Frame id translation between tag versions.
//!
//! Frames are held with v2.4 ids. Reading a v2.2 tag maps its three-letter
//! ids through a fixed table; reading v2.2/2.3 folds the date frames into
//! `TDRC`. Writing v2.3 goes through [`downgrade_to_v3`], a lossy one-way
//! transform applied to a copy of the frame list before rendering.

use tracing::debug;

use crate::frame::{Frame, FrameId, TextFrame};

const V22_IDS: &[(&[u8; 3], &[u8; 4])] = &[
    (b"BUF", b"RBUF"),
    (b"CNT", b"PCNT"),
    (b"COM", b"COMM"),
    (b"CRA", b"AENC"),
    (b"ETC", b"ETCO"),
    (b"EQU", b"EQUA"),
    (b"GEO", b"GEOB"),
    (b"IPL", b"IPLS"),
    (b"MCI", b"MCDI"),
    (b"MLL", b"MLLT"),
    (b"PIC", b"APIC"),
    (b"POP", b"POPM"),
    (b"REV", b"RVRB"),
    (b"RVA", b"RVAD"),
    (b"SLT", b"SYLT"),
    (b"STC", b"SYTC"),
    (b"TAL", b"TALB"),
    (b"TBP", b"TBPM"),
    (b"TCM", b"TCOM"),
    (b"TCO", b"TCON"),
    (b"TCP", b"TCMP"),
    (b"TCR", b"TCOP"),
    (b"TDA", b"TDAT"),
    (b"TDY", b"TDLY"),
    (b"TEN", b"TENC"),
    (b"TFT", b"TFLT"),
    (b"TIM", b"TIME"),
    (b"TKE", b"TKEY"),
    (b"TLA", b"TLAN"),
    (b"TLE", b"TLEN"),
    (b"TMT", b"TMED"),
    (b"TOA", b"TOPE"),
    (b"TOF", b"TOFN"),
    (b"TOL", b"TOLY"),
    (b"TOR", b"TORY"),
    (b"TOT", b"TOAL"),
    (b"TP1", b"TPE1"),
    (b"TP2", b"TPE2"),
    (b"TP3", b"TPE3"),
    (b"TP4", b"TPE4"),
    (b"TPA", b"TPOS"),
    (b"TPB", b"TPUB"),
    (b"TRC", b"TSRC"),
    (b"TRD", b"TRDA"),
    (b"TRK", b"TRCK"),
    (b"TS2", b"TSO2"),
    (b"TSA", b"TSOA"),
    (b"TSC", b"TSOC"),
    (b"TSI", b"TSIZ"),
    (b"TSP", b"TSOP"),
    (b"TSS", b"TSSE"),
    (b"TST", b"TSOT"),
    (b"TT1", b"TIT1"),
    (b"TT2", b"TIT2"),
    (b"TT3", b"TIT3"),
    (b"TXT", b"TEXT"),
    (b"TXX", b"TXXX"),
    (b"TYE", b"TYER"),
    (b"UFI", b"UFID"),
    (b"ULT", b"USLT"),
    (b"WAF", b"WOAF"),
    (b"WAR", b"WOAR"),
    (b"WAS", b"WOAS"),
    (b"WCM", b"WCOM"),
    (b"WCP", b"WCOP"),
    (b"WPB", b"WPUB"),
    (b"WXX", b"WXXX"),
];

/// Frames that exist only in v2.3 and have no v2.4 replacement we can
/// build. They are kept as raw bytes and dropped when writing v2.4.
const V3_ONLY: &[&[u8; 4]] = &[b"EQUA", b"RVAD", b"TRDA", b"TSIZ"];

/// Frames that v2.3 cannot represent.
const V4_ONLY: &[&[u8; 4]] = &[
    b"ASPI", b"EQU2", b"RVA2", b"SEEK", b"SIGN", b"TDEN", b"TDRL", b"TDTG", b"TMOO", b"TPRO",
    b"TSOA", b"TSOP", b"TSOT", b"TSST",
];

/// Map a three-letter v2.2 id to its modern equivalent.
pub fn translate_v22(id: FrameId) -> Option<FrameId> {
    if !id.is_legacy() {
        return None;
    }
    let short = [id.0[0], id.0[1], id.0[2]];
    V22_IDS
        .iter()
        .find(|(old, _)| **old == short)
        .map(|(_, new)| FrameId::new(new))
}

pub fn is_v3_only(id: FrameId) -> bool {
    V3_ONLY.iter().any(|v| **v == id.0)
}

pub fn is_v4_only(id: FrameId) -> bool {
    V4_ONLY.iter().any(|v| **v == id.0)
}

fn text_of(frames: &[Frame], id: &[u8; 4]) -> Option<String> {
    frames.iter().find_map(|f| match f {
        Frame::Text(t) if t.header.id.0 == *id => t.text().ok(),
        _ => None,
    })
}

fn digits(text: &str, n: usize) -> Option<&str> {
    let text = text.trim();
    (text.len() >= n && text.as_bytes()[..n].iter().all(u8::is_ascii_digit)).then(|| &text[..n])
}

/// `TDRC` text built from `TYER`, `TDAT` and `TIME`, with flags telling
/// whether the date and time frames went into it.
struct RecordingTime {
    text: String,
    has_date: bool,
    has_time: bool,
}

fn merge_recording_time(frames: &[Frame]) -> Option<RecordingTime> {
    let year = text_of(frames, b"TYER")?;
    let mut merged = RecordingTime {
        text: digits(&year, 4)?.to_string(),
        has_date: false,
        has_time: false,
    };
    // TDAT is DDMM
    let Some(date) = text_of(frames, b"TDAT").filter(|d| digits(d, 4).is_some()) else {
        return Some(merged);
    };
    let date = date.trim();
    merged.text.push_str(&format!("-{}-{}", &date[2..4], &date[0..2]));
    merged.has_date = true;
    // TIME is HHMM
    if let Some(time) = text_of(frames, b"TIME").filter(|t| digits(t, 4).is_some()) {
        let time = time.trim();
        merged.text.push_str(&format!("T{}:{}", &time[0..2], &time[2..4]));
        merged.has_time = true;
    }
    Some(merged)
}

/// Bring frames read from a v2.2/2.3 tag to their v2.4 form:
/// `TYER`+`TDAT`+`TIME` become one `TDRC`, `TORY` becomes `TDOR`,
/// `IPLS` becomes `TIPL`. Date frames that cannot be merged are kept as
/// they were read.
pub fn upgrade_frames(frames: Vec<Frame>, version: u8) -> Vec<Frame> {
    if version >= 4 {
        return frames;
    }

    let recording_time = merge_recording_time(&frames);
    let has_date = recording_time.as_ref().is_some_and(|r| r.has_date);
    let has_time = recording_time.as_ref().is_some_and(|r| r.has_time);

    let mut out = Vec::with_capacity(frames.len());
    for mut frame in frames {
        match &frame.id().0 {
            b"TYER" => match &recording_time {
                Some(tdrc) => {
                    let mut merged = TextFrame::with_text(FrameId::new(b"TDRC"), &tdrc.text);
                    merged.header.flags = frame.header().flags;
                    debug!("Merged date frames into TDRC {:?}", tdrc.text);
                    out.push(Frame::Text(merged));
                }
                None => {
                    debug!("Keeping TYER that is not a four digit year");
                    out.push(frame);
                }
            },
            b"TDAT" if has_date => {}
            b"TIME" if has_time => {}
            b"TORY" => {
                frame.header_mut().id = FrameId::new(b"TDOR");
                out.push(frame);
            }
            b"IPLS" => {
                frame.header_mut().id = FrameId::new(b"TIPL");
                out.push(frame);
            }
            _ => out.push(frame),
        }
    }
    out
}

/// Produce the frame list for a v2.3 tag. `TDRC` is split into
/// `TYER`/`TDAT`/`TIME`, `TDOR` becomes `TORY`, `TIPL` and `TMCL` merge
/// into `IPLS`, and v2.4-only frames are dropped.
pub fn downgrade_to_v3(frames: &[Frame]) -> Vec<Frame> {
    let mut out = Vec::with_capacity(frames.len());
    let mut people: Option<(usize, Vec<String>)> = None;

    for frame in frames {
        let id = frame.id();
        match &id.0 {
            b"TDRC" => {
                let Frame::Text(t) = frame else {
                    out.push(frame.clone());
                    continue;
                };
                let Ok(text) = t.text() else { continue };
                out.extend(split_recording_time(&text));
            }
            b"TDOR" => {
                if let Some(year) = text_of(std::slice::from_ref(frame), b"TDOR")
                    .as_deref()
                    .and_then(|t| digits(t, 4))
                {
                    out.push(Frame::Text(TextFrame::with_text(FrameId::new(b"TORY"), year)));
                }
            }
            b"TIPL" | b"TMCL" => {
                let values = match frame {
                    Frame::Text(t) => t.fields().map(|f| f.values.clone()).unwrap_or_default(),
                    _ => Vec::new(),
                };
                match &mut people {
                    Some((_, merged)) => merged.extend(values),
                    None => {
                        people = Some((out.len(), values));
                        // Placeholder, replaced once every people frame is seen.
                        out.push(frame.clone());
                    }
                }
            }
            _ if is_v4_only(id) => {
                debug!("Dropping v2.4-only frame {} for v2.3 output", id);
            }
            _ => out.push(frame.clone()),
        }
    }

    if let Some((index, values)) = people {
        out[index] = Frame::Text(TextFrame::new(FrameId::new(b"IPLS"), values));
    }
    out
}

fn split_recording_time(text: &str) -> Vec<Frame> {
    let mut out = Vec::new();
    let Some(year) = digits(text, 4) else {
        return out;
    };
    out.push(Frame::Text(TextFrame::with_text(FrameId::new(b"TYER"), year)));

    // yyyy-MM-dd
    let bytes = text.as_bytes();
    if bytes.len() >= 10 && bytes[..10].is_ascii() && bytes[4] == b'-' && bytes[7] == b'-' {
        let (month, day) = (&text[5..7], &text[8..10]);
        out.push(Frame::Text(TextFrame::with_text(
            FrameId::new(b"TDAT"),
            &format!("{day}{month}"),
        )));
        // yyyy-MM-ddTHH:mm
        if bytes.len() >= 16 && bytes[..16].is_ascii() && bytes[10] == b'T' && bytes[13] == b':' {
            let (hour, minute) = (&text[11..13], &text[14..16]);
            out.push(Frame::Text(TextFrame::with_text(
                FrameId::new(b"TIME"),
                &format!("{hour}{minute}"),
            )));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: &[u8; 4], value: &str) -> Frame {
        Frame::Text(TextFrame::with_text(FrameId::new(id), value))
    }

    fn texts(frames: &[Frame]) -> Vec<(String, String)> {
        frames
            .iter()
            .map(|f| match f {
                Frame::Text(t) => (t.header.id.to_string(), t.text().unwrap()),
                other => (other.id().to_string(), String::new()),
            })
            .collect()
    }

    #[test]
    fn v22_table() {
        assert_eq!(translate_v22(FrameId::legacy(b"TT2")), Some(FrameId::new(b"TIT2")));
        assert_eq!(translate_v22(FrameId::legacy(b"PIC")), Some(FrameId::new(b"APIC")));
        assert_eq!(translate_v22(FrameId::legacy(b"XYZ")), None);
        assert_eq!(translate_v22(FrameId::new(b"TIT2")), None);
    }

    #[test]
    fn upgrade_merges_dates() {
        let frames = vec![
            text(b"TIT2", "Song"),
            text(b"TYER", "2004"),
            text(b"TDAT", "1503"),
            text(b"TIME", "2130"),
            text(b"TORY", "1999"),
        ];
        let up = upgrade_frames(frames, 3);
        assert_eq!(
            texts(&up),
            vec![
                ("TIT2".into(), "Song".into()),
                ("TDRC".into(), "2004-03-15T21:30".into()),
                ("TDOR".into(), "1999".into()),
            ]
        );
    }

    #[test]
    fn upgrade_year_only() {
        let up = upgrade_frames(vec![text(b"TYER", "1987")], 3);
        assert_eq!(texts(&up), vec![("TDRC".into(), "1987".into())]);
    }

    #[test]
    fn upgrade_keeps_unmergeable_dates() {
        let up = upgrade_frames(vec![text(b"TIT2", "T"), text(b"TYER", "Unknown")], 3);
        assert_eq!(
            texts(&up),
            vec![("TIT2".into(), "T".into()), ("TYER".into(), "Unknown".into())]
        );

        let up = upgrade_frames(vec![text(b"TDAT", "1503"), text(b"TIME", "2130")], 3);
        assert_eq!(
            texts(&up),
            vec![("TDAT".into(), "1503".into()), ("TIME".into(), "2130".into())]
        );
    }

    #[test]
    fn upgrade_merges_only_what_parses() {
        let frames = vec![
            text(b"TYER", "2004"),
            text(b"TDAT", "1503"),
            text(b"TIME", "late"),
        ];
        let up = upgrade_frames(frames, 3);
        assert_eq!(
            texts(&up),
            vec![("TDRC".into(), "2004-03-15".into()), ("TIME".into(), "late".into())]
        );

        let up = upgrade_frames(vec![text(b"TYER", "2004"), text(b"TDAT", "15th")], 3);
        assert_eq!(
            texts(&up),
            vec![("TDRC".into(), "2004".into()), ("TDAT".into(), "15th".into())]
        );
    }

    #[test]
    fn upgrade_is_noop_for_v4() {
        let up = upgrade_frames(vec![text(b"TYER", "1987")], 4);
        assert_eq!(up[0].id(), FrameId::new(b"TYER"));
    }

    #[test]
    fn downgrade_splits_recording_time() {
        let down = downgrade_to_v3(&[text(b"TDRC", "2004-03-15T21:30:00")]);
        assert_eq!(
            texts(&down),
            vec![
                ("TYER".into(), "2004".into()),
                ("TDAT".into(), "1503".into()),
                ("TIME".into(), "2130".into()),
            ]
        );
    }

    #[test]
    fn downgrade_renames_and_drops() {
        let frames = vec![
            text(b"TIPL", "producer"),
            text(b"TSOP", "Artist, The"),
            text(b"TDOR", "1999-01-01"),
            text(b"TMCL", "guitar"),
            text(b"TALB", "Album"),
        ];
        let down = downgrade_to_v3(&frames);
        assert_eq!(
            texts(&down),
            vec![
                ("IPLS".into(), "producer / guitar".into()),
                ("TORY".into(), "1999".into()),
                ("TALB".into(), "Album".into()),
            ]
        );
    }

    #[test]
    fn v3_only_ids() {
        assert!(is_v3_only(FrameId::new(b"RVAD")));
        assert!(!is_v3_only(FrameId::new(b"RVA2")));
        assert!(is_v4_only(FrameId::new(b"RVA2")));
    }
}
