//! Scheduled-event tables for discrete-event compartment simulators.
//!
//! Purpose
//! -------
//! Provide [`EventTable`], the validated, normalized, time-ordered set of
//! scheduled events consumed by the simulator, together with its auxiliary
//! select matrix `E` and shift matrix `N`. The sorted table is the binary
//! contract between the inference engine and the simulator: rows execute in
//! `(time, kind, select)` order.
//!
//! Key behaviors
//! -------------
//! - [`EventFrame`] is the row-oriented input surface: eight columns, with
//!   `event` accepted either as integer codes `0..=3` or as the labels
//!   `exit|enter|intTrans|extTrans`, and `time` accepted either as integer
//!   days or as calendar dates with a caller-supplied origin day `t0`.
//! - Construction validates every field (see [`EventTable::new`]) and fails
//!   with a descriptive [`EventError`] naming the column and row; no partial
//!   table is ever exposed.
//! - How the caller encoded `event` and `time` is retained as explicit
//!   metadata ([`EventOrigin`], [`TimeOrigin`]) so [`EventTable::to_frame`]
//!   can render the table back in its original vocabulary.
//!
//! Invariants & assumptions
//! ------------------------
//! - All columns have equal length.
//! - `time >= 1`, `node >= 1`, `n >= 0`, `proportion` in `[0, 1]`,
//!   `1 <= select <= E.n_selectors()`.
//! - `dest >= 1` exactly when the kind is `ExtTransfer` (stored as 0
//!   otherwise); `shift >= 1` exactly when the kind is `IntTransfer`.
//! - Rows are sorted lexicographically by `(time, kind, select)`; the sort is
//!   stable, so equal keys keep input order.
//! - When both `E` and `N` are non-empty their compartment labels agree.
use crate::events::errors::{EventError, EventResult};
use crate::events::matrices::{validate_row_labels, SelectMatrix, ShiftMatrix};
use chrono::NaiveDate;

/// The four scheduled-event kinds, in execution-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// Individuals exit the population.
    Exit = 0,
    /// Individuals enter the population.
    Enter = 1,
    /// Individuals move between compartments within a node.
    IntTransfer = 2,
    /// Individuals move from one node to another.
    ExtTransfer = 3,
}

impl EventKind {
    /// Map an integer code `0..=3` to its kind.
    pub fn from_code(row: usize, code: i64) -> EventResult<Self> {
        match code {
            0 => Ok(EventKind::Exit),
            1 => Ok(EventKind::Enter),
            2 => Ok(EventKind::IntTransfer),
            3 => Ok(EventKind::ExtTransfer),
            _ => Err(EventError::InvalidEventCode { row, code }),
        }
    }

    /// Map a string label to its kind.
    pub fn from_label(row: usize, label: &str) -> EventResult<Self> {
        match label {
            "exit" => Ok(EventKind::Exit),
            "enter" => Ok(EventKind::Enter),
            "intTrans" => Ok(EventKind::IntTransfer),
            "extTrans" => Ok(EventKind::ExtTransfer),
            _ => Err(EventError::UnknownEventLabel { row, label: label.to_string() }),
        }
    }

    /// The integer code of this kind.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// The canonical string label of this kind.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Exit => "exit",
            EventKind::Enter => "enter",
            EventKind::IntTransfer => "intTrans",
            EventKind::ExtTransfer => "extTrans",
        }
    }
}

/// One normalized scheduled event.
///
/// `node`, `dest`, `select`, and `shift` are stored 1-based, exactly as the
/// simulator consumes them; `dest` and `shift` are 0 for kinds that ignore
/// them. A count `n` of 0 means the count is drawn binomially from
/// `proportion` at execution time.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub time: i64,
    pub node: usize,
    pub dest: usize,
    pub n: u64,
    pub proportion: f64,
    pub select: usize,
    pub shift: usize,
}

/// How the `event` column was supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// Integer codes `0..=3`.
    Code,
    /// String labels `exit|enter|intTrans|extTrans`.
    Label,
}

/// How the `time` column was supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrigin {
    /// Integer days.
    Int,
    /// Calendar dates, converted to day offsets from the stored origin.
    Date(NaiveDate),
}

/// The `event` input column: codes or labels, never mixed.
#[derive(Debug, Clone, PartialEq)]
pub enum EventColumn {
    Codes(Vec<i64>),
    Labels(Vec<String>),
}

impl EventColumn {
    fn len(&self) -> usize {
        match self {
            EventColumn::Codes(v) => v.len(),
            EventColumn::Labels(v) => v.len(),
        }
    }
}

/// The `time` input column: integer days or calendar dates, never mixed.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeColumn {
    Days(Vec<i64>),
    Dates(Vec<NaiveDate>),
}

impl TimeColumn {
    fn len(&self) -> usize {
        match self {
            TimeColumn::Days(v) => v.len(),
            TimeColumn::Dates(v) => v.len(),
        }
    }
}

/// Row-oriented input for [`EventTable::new`]: the eight event columns plus
/// an optional reference day `t0`, required when `time` holds dates.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub event: EventColumn,
    pub time: TimeColumn,
    pub node: Vec<i64>,
    pub dest: Vec<i64>,
    pub n: Vec<i64>,
    pub proportion: Vec<f64>,
    pub select: Vec<i64>,
    pub shift: Vec<i64>,
    pub t0: Option<NaiveDate>,
}

/// Validated, time-ordered scheduled events plus the auxiliary matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    events: Vec<Event>,
    select_matrix: SelectMatrix,
    shift_matrix: ShiftMatrix,
    event_origin: EventOrigin,
    time_origin: TimeOrigin,
}

impl EventTable {
    /// Validate, normalize, and sort a raw [`EventFrame`] into a table.
    ///
    /// Normalization maps string event labels to codes, subtracts the origin
    /// day from date-valued times, and zeroes the `dest`/`shift` fields of
    /// kinds that ignore them. Rows are then stably sorted by
    /// `(time, kind, select)`.
    ///
    /// # Errors
    /// - [`EventError::ColumnLengthMismatch`] if any column differs in length
    ///   from `event`.
    /// - [`EventError::MissingTimeOrigin`] if `time` holds dates and `t0` is
    ///   absent.
    /// - Per-row variants for each field constraint listed in the module
    ///   docs, naming the input row at which validation stopped.
    /// - Label-consistency errors from the `E`/`N` row-label check.
    pub fn new(
        frame: EventFrame, select_matrix: SelectMatrix, shift_matrix: ShiftMatrix,
    ) -> EventResult<Self> {
        validate_row_labels(&select_matrix, &shift_matrix)?;

        let n_rows = frame.event.len();
        check_len("time", n_rows, frame.time.len())?;
        check_len("node", n_rows, frame.node.len())?;
        check_len("dest", n_rows, frame.dest.len())?;
        check_len("n", n_rows, frame.n.len())?;
        check_len("proportion", n_rows, frame.proportion.len())?;
        check_len("select", n_rows, frame.select.len())?;
        check_len("shift", n_rows, frame.shift.len())?;

        let event_origin = match frame.event {
            EventColumn::Codes(_) => EventOrigin::Code,
            EventColumn::Labels(_) => EventOrigin::Label,
        };
        let time_origin = match (&frame.time, frame.t0) {
            (TimeColumn::Days(_), _) => TimeOrigin::Int,
            (TimeColumn::Dates(_), Some(t0)) => TimeOrigin::Date(t0),
            (TimeColumn::Dates(_), None) => return Err(EventError::MissingTimeOrigin),
        };

        let n_selectors = select_matrix.n_selectors();
        let mut events = Vec::with_capacity(n_rows);
        for row in 0..n_rows {
            let kind = match &frame.event {
                EventColumn::Codes(codes) => EventKind::from_code(row, codes[row])?,
                EventColumn::Labels(labels) => EventKind::from_label(row, &labels[row])?,
            };
            let time = match (&frame.time, time_origin) {
                (TimeColumn::Days(days), _) => days[row],
                (TimeColumn::Dates(dates), TimeOrigin::Date(t0)) => {
                    dates[row].signed_duration_since(t0).num_days()
                }
                (TimeColumn::Dates(_), TimeOrigin::Int) => unreachable!(),
            };
            if time < 1 {
                return Err(EventError::InvalidTime { row, value: time });
            }
            let node = frame.node[row];
            if node < 1 {
                return Err(EventError::InvalidNode { row, value: node });
            }
            let dest = match kind {
                EventKind::ExtTransfer => {
                    let dest = frame.dest[row];
                    if dest < 1 {
                        if dest == 0 {
                            return Err(EventError::MissingDest { row });
                        }
                        return Err(EventError::InvalidDest { row, value: dest });
                    }
                    dest as usize
                }
                _ => 0,
            };
            let n = frame.n[row];
            if n < 0 {
                return Err(EventError::InvalidCount { row, value: n });
            }
            let proportion = frame.proportion[row];
            if !proportion.is_finite() || !(0.0..=1.0).contains(&proportion) {
                return Err(EventError::InvalidProportion { row, value: proportion });
            }
            let select = frame.select[row];
            if select < 1 || select as usize > n_selectors {
                return Err(EventError::InvalidSelect { row, value: select, n_selectors });
            }
            let shift = match kind {
                EventKind::IntTransfer => {
                    let shift = frame.shift[row];
                    if shift < 1 {
                        if shift == 0 {
                            return Err(EventError::MissingShift { row });
                        }
                        return Err(EventError::InvalidShift { row, value: shift });
                    }
                    shift as usize
                }
                _ => 0,
            };
            events.push(Event {
                kind,
                time,
                node: node as usize,
                dest,
                n: n as u64,
                proportion,
                select: select as usize,
                shift,
            });
        }

        events.sort_by_key(|e| (e.time, e.kind, e.select));
        Ok(EventTable { events, select_matrix, shift_matrix, event_origin, time_origin })
    }

    /// The sorted events, in execution order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` when the table has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The select matrix `E`.
    pub fn select_matrix(&self) -> &SelectMatrix {
        &self.select_matrix
    }

    /// The shift matrix `N`.
    pub fn shift_matrix(&self) -> &ShiftMatrix {
        &self.shift_matrix
    }

    /// How the `event` column was originally encoded.
    pub fn event_origin(&self) -> EventOrigin {
        self.event_origin
    }

    /// How the `time` column was originally encoded.
    pub fn time_origin(&self) -> TimeOrigin {
        self.time_origin
    }

    /// Render the table back into an [`EventFrame`], consulting the origin
    /// metadata: labels are restored when the caller supplied labels and day
    /// offsets are converted back to dates when the caller supplied dates.
    ///
    /// Feeding the result back into [`EventTable::new`] reproduces the table
    /// exactly, including row order.
    pub fn to_frame(&self) -> EventFrame {
        let event = match self.event_origin {
            EventOrigin::Code => {
                EventColumn::Codes(self.events.iter().map(|e| e.kind.code()).collect())
            }
            EventOrigin::Label => EventColumn::Labels(
                self.events.iter().map(|e| e.kind.label().to_string()).collect(),
            ),
        };
        let (time, t0) = match self.time_origin {
            TimeOrigin::Int => {
                (TimeColumn::Days(self.events.iter().map(|e| e.time).collect()), None)
            }
            TimeOrigin::Date(t0) => (
                TimeColumn::Dates(
                    self.events.iter().map(|e| t0 + chrono::Duration::days(e.time)).collect(),
                ),
                Some(t0),
            ),
        };
        EventFrame {
            event,
            time,
            node: self.events.iter().map(|e| e.node as i64).collect(),
            dest: self.events.iter().map(|e| e.dest as i64).collect(),
            n: self.events.iter().map(|e| e.n as i64).collect(),
            proportion: self.events.iter().map(|e| e.proportion).collect(),
            select: self.events.iter().map(|e| e.select as i64).collect(),
            shift: self.events.iter().map(|e| e.shift as i64).collect(),
            t0,
        }
    }

    pub(crate) fn from_sorted_events(
        events: Vec<Event>, select_matrix: SelectMatrix, shift_matrix: ShiftMatrix,
        event_origin: EventOrigin, time_origin: TimeOrigin,
    ) -> Self {
        EventTable { events, select_matrix, shift_matrix, event_origin, time_origin }
    }
}

impl std::fmt::Display for EventTable {
    /// One-line summary: total count, count per kind, and time span.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts = [0usize; 4];
        for e in &self.events {
            counts[e.kind as usize] += 1;
        }
        let span = match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => format!("t = {}..={}", first.time, last.time),
            _ => "empty".to_string(),
        };
        write!(
            f,
            "{} scheduled events ({} exit, {} enter, {} intTrans, {} extTrans; {})",
            self.events.len(),
            counts[0],
            counts[1],
            counts[2],
            counts[3],
            span
        )
    }
}

fn check_len(column: &'static str, expected: usize, actual: usize) -> EventResult<()> {
    if expected != actual {
        return Err(EventError::ColumnLengthMismatch { column, expected, actual });
    }
    Ok(())
}
