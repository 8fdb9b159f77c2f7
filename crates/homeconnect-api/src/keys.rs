//! Well-known setting, status, option and event keys.

// ── Settings ─────────────────────────────────────────────────────────

pub const POWER_STATE: &str = "BSH.Common.Setting.PowerState";
pub const FREEZER_SETPOINT_TEMPERATURE: &str =
    "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureFreezer";
pub const REFRIGERATOR_SETPOINT_TEMPERATURE: &str =
    "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureRefrigerator";
pub const FREEZER_SUPER_MODE: &str = "Refrigeration.FridgeFreezer.Setting.SuperModeFreezer";
pub const REFRIGERATOR_SUPER_MODE: &str =
    "Refrigeration.FridgeFreezer.Setting.SuperModeRefrigerator";

// ── Status ───────────────────────────────────────────────────────────

pub const DOOR_STATE: &str = "BSH.Common.Status.DoorState";
pub const OPERATION_STATE: &str = "BSH.Common.Status.OperationState";
pub const REMOTE_CONTROL_ACTIVE: &str = "BSH.Common.Status.RemoteControlActive";
pub const REMOTE_CONTROL_START_ALLOWED: &str = "BSH.Common.Status.RemoteControlStartAllowed";
pub const LOCAL_CONTROL_ACTIVE: &str = "BSH.Common.Status.LocalControlActive";

// ── Program options / events ─────────────────────────────────────────

pub const ACTIVE_PROGRAM: &str = "BSH.Common.Root.ActiveProgram";
pub const SELECTED_PROGRAM: &str = "BSH.Common.Root.SelectedProgram";
pub const REMAINING_PROGRAM_TIME: &str = "BSH.Common.Option.RemainingProgramTime";
pub const PROGRAM_PROGRESS: &str = "BSH.Common.Option.ProgramProgress";
pub const ELAPSED_PROGRAM_TIME: &str = "BSH.Common.Option.ElapsedProgramTime";
pub const DURATION: &str = "BSH.Common.Option.Duration";

// ── Enum values ──────────────────────────────────────────────────────

pub const POWER_STATE_ON: &str = "BSH.Common.EnumType.PowerState.On";
pub const POWER_STATE_OFF: &str = "BSH.Common.EnumType.PowerState.Off";
pub const POWER_STATE_STANDBY: &str = "BSH.Common.EnumType.PowerState.Standby";
pub const DOOR_STATE_OPEN: &str = "BSH.Common.EnumType.DoorState.Open";
pub const DOOR_STATE_CLOSED: &str = "BSH.Common.EnumType.DoorState.Closed";
pub const DOOR_STATE_LOCKED: &str = "BSH.Common.EnumType.DoorState.Locked";
