// Session state machine.
//
// IDLE ──generate──▶ LOADING ──ok──▶ SUCCESS ──reset──▶ IDLE
//                      │                 └──generate──▶ LOADING
//                      └──err──▶ ERROR ──generate──▶ LOADING
//
// Every async operation captures a Ticket when it starts. Its completion is
// applied only while the ticket still matches the current generation, so
// results that were overtaken by a reset or a new image are dropped.

use backdrop_common::{BackdropError, EditRequest, EditResult, EncodedImage, ErrorKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    Loading,
    Success,
    Error,
}

/// Generation stamp taken when an async operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// An edit that has moved the session into LOADING and awaits submission.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    pub ticket: Ticket,
    pub request: EditRequest,
}

/// Why a generate request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingImage,
    MissingInstruction,
    InFlight,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingImage => write!(f, "no source image selected"),
            SkipReason::MissingInstruction => write!(f, "instruction is empty"),
            SkipReason::InFlight => write!(f, "a generation is already in progress"),
        }
    }
}

/// Serializable view of a session for the presentation layer.
///
/// `error` alongside IDLE or LOADING is a failed image load; alongside ERROR
/// it is the latest failure of either kind. SUCCESS never carries one.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub phase: Phase,
    pub source_image: Option<EncodedImage>,
    pub instruction: String,
    pub generated_image: Option<EncodedImage>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    id: Uuid,
    phase: Phase,
    source_image: Option<EncodedImage>,
    instruction: String,
    generated_image: Option<EncodedImage>,
    error: Option<BackdropError>,
    load_generation: u64,
    edit_generation: u64,
    updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(id: Uuid, instruction: impl Into<String>) -> Self {
        Self {
            id,
            phase: Phase::Idle,
            source_image: None,
            instruction: instruction.into(),
            generated_image: None,
            error: None,
            load_generation: 0,
            edit_generation: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn source_image(&self) -> Option<&EncodedImage> {
        self.source_image.as_ref()
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn generated_image(&self) -> Option<&EncodedImage> {
        self.generated_image.as_ref()
    }

    pub fn error(&self) -> Option<&BackdropError> {
        self.error.as_ref()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // --- image selection ---

    /// Start reading a newly selected file. Any earlier unfinished load is
    /// superseded.
    pub fn begin_image_load(&mut self) -> Ticket {
        self.load_generation += 1;
        Ticket(self.load_generation)
    }

    /// Apply a finished load. Returns `false` (and changes nothing) when a newer
    /// selection overtook it.
    pub fn image_loaded(&mut self, ticket: Ticket, image: EncodedImage) -> bool {
        if ticket != Ticket(self.load_generation) {
            return false;
        }
        self.source_image = Some(image);
        self.generated_image = None;
        self.error = None;
        // A generation still in flight belongs to the old image.
        self.edit_generation += 1;
        self.phase = Phase::Idle;
        self.touch();
        true
    }

    /// Surface a failed load. The current source image is kept; a SUCCESS
    /// result is dropped and the session returns to IDLE, so SUCCESS is never
    /// reported together with an error.
    pub fn image_load_failed(&mut self, ticket: Ticket, error: BackdropError) -> bool {
        if ticket != Ticket(self.load_generation) {
            return false;
        }
        if self.phase == Phase::Success {
            self.generated_image = None;
            self.phase = Phase::Idle;
        }
        self.error = Some(error);
        self.touch();
        true
    }

    /// Load and apply an image in one step.
    pub fn select_image(&mut self, image: EncodedImage) {
        let ticket = self.begin_image_load();
        self.image_loaded(ticket, image);
    }

    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.instruction = instruction.into();
        self.touch();
    }

    // --- generation ---

    /// Move to LOADING and hand out the request to submit. Missing inputs or
    /// an edit already in flight leave the state untouched.
    pub fn begin_generate(&mut self) -> Result<PendingEdit, SkipReason> {
        if self.phase == Phase::Loading {
            return Err(SkipReason::InFlight);
        }
        let source_image = self.source_image.clone().ok_or(SkipReason::MissingImage)?;
        if self.instruction.trim().is_empty() {
            return Err(SkipReason::MissingInstruction);
        }

        self.edit_generation += 1;
        self.phase = Phase::Loading;
        self.error = None;
        self.touch();

        Ok(PendingEdit {
            ticket: Ticket(self.edit_generation),
            request: EditRequest::new(source_image, self.instruction.clone()),
        })
    }

    /// Apply a pipeline result. Returns `false` when the edit was overtaken.
    pub fn complete(&mut self, ticket: Ticket, result: EditResult) -> bool {
        if ticket != Ticket(self.edit_generation) || self.phase != Phase::Loading {
            return false;
        }
        match result {
            Ok(image) => {
                self.generated_image = Some(image);
                self.error = None;
                self.phase = Phase::Success;
            }
            Err(error) => {
                self.generated_image = None;
                self.error = Some(error);
                self.phase = Phase::Error;
            }
        }
        self.touch();
        true
    }

    /// Start over: back to IDLE with the generated image cleared. Source
    /// image and instruction are kept for a quick retry.
    pub fn reset(&mut self) {
        self.edit_generation += 1;
        self.phase = Phase::Idle;
        self.generated_image = None;
        self.error = None;
        self.touch();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            phase: self.phase,
            source_image: self.source_image.clone(),
            instruction: self.instruction.clone(),
            generated_image: self.generated_image.clone(),
            error: self.error.as_ref().map(BackdropError::user_message),
            error_kind: self.error.as_ref().map(BackdropError::kind),
            updated_at: self.updated_at,
        }
    }
}
