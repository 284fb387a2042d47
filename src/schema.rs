//! Vehicle-model detail schemas.
//!
//! Every model family has its own escape-door drill with a different list of
//! timed steps. The table below is the single source of truth for the detail
//! tables, the column slicing of uploaded rows and the rendering in `show`.

use serde::Serialize;

/// One timed step of a drill: its store column and the label used in exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepField {
    pub column: &'static str,
    pub label: &'static str,
}

const fn step(column: &'static str, label: &'static str) -> StepField {
    StepField { column, label }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum DetailVariant {
    #[serde(rename = "09A02")]
    Model09A02,
    #[serde(rename = "09A0304")]
    Model09A0304,
    #[serde(rename = "10A01")]
    Model10A01,
    #[serde(rename = "10A02")]
    Model10A02,
}

pub const ALL_VARIANTS: [DetailVariant; 4] = [
    DetailVariant::Model09A02,
    DetailVariant::Model09A0304,
    DetailVariant::Model10A01,
    DetailVariant::Model10A02,
];

const FIELDS_09A02: &[StepField] = &[
    step("total_duration", "整体耗时"),
    step("emergency_door_release_duration", "逃生门释放耗时"),
    step("unlock_handle_duration", "解锁逃生门红色手柄耗时"),
    step("push_door_duration", "向外推逃生门以完全释放耗时"),
    step("release_ramp_duration", "放倒底部踏板耗时"),
    step("retract_ramp_duration", "复位底部踏板耗时"),
    step("get_butterfly_pin_duration", "拿取蝴蝶销耗时"),
    step("install_butterfly_pin_duration", "正确安装蝴蝶销耗时"),
    step("get_rod_duration", "拿取扭杆耗时"),
    step("retract_window_duration", "使用扭杆收回逃生门至接近垂直耗时"),
    step("reset_rod_duration", "复位扭杆耗时"),
    step("escape_second_door_lock_duration", "逃生门二级锁闭耗时"),
    step("escape_first_door_lock_duration", "逃生门一级锁闭耗时"),
    step("remove_butterfly_pin_duration", "取下蝴蝶销耗时"),
    step("reset_lock_handle_duration", "复位蝴蝶销耗时"),
    step("confirm_left_door_duration", "确认左关门灯耗时"),
    step("confirm_hmi_display_duration", "确认HMI逃生门显示耗时"),
];

const FIELDS_09A0304: &[StepField] = &[
    step("total_duration", "整体耗时"),
    step("emergency_door_release_duration", "逃生门释放耗时"),
    step("remove_red_handle_duration", "取下红色手柄保险销耗时"),
    step("unlock_red_handle_duration", "解锁红色手柄耗时"),
    step("push_door_duration", "向外推出逃生门以完全释放耗时"),
    step("operate_recovery_rope_duration", "操作回收绳固定手柄耗时"),
    step("pull_recovery_rope_duration", "向下拉动回收绳使逃生门上端到位耗时"),
    step("lift_recovery_rope_duration", "向上提起回收绳使逃生门关闭到位耗时"),
    step("reset_red_handle_duration", "复位红色手柄耗时"),
    step("install_red_handle_duration", "安装红色手柄保险销耗时"),
    step("reset_recovery_rope_duration", "复位回收绳固定手柄耗时"),
    step("confirm_hmi_display_duration", "确认HMI逃生门图标显示耗时"),
];

const FIELDS_10A01: &[StepField] = &[
    step("total_duration", "整体耗时"),
    step("emergency_door_release_duration", "逃生门释放耗时"),
    step("unlock_escape_door_box", "解锁逃生门箱体解锁把手"),
    step("remove_escape_door_box_cover", "取下逃生门箱体上盖板"),
    step("unlock_escape_door_window", "解锁逃生门窗体解锁把手"),
    step("push_escape_door_window", "向外推出逃生门窗体"),
    step("release_escape_door_slope", "完全释放逃生门坡道"),
    step("retract_escape_door_slope", "完全收回逃生门坡道"),
    step("retract_escape_door_window", "收回逃生门窗体"),
    step("reset_escape_door_window_push_rod", "复位逃生门窗体推杆"),
    step("reset_escape_door_window_unlock_handle", "复位逃生门窗体解锁把手"),
    step("install_escape_door_box_cover", "安装逃生门箱体上盖板"),
    step("reset_escape_door_box_unlock_handle", "复位逃生门箱体解锁把手"),
    step("close_handle_outer_cover", "关闭把手外盖板"),
    step("confirm_ddu_escape_door_display", "确认DDU逃生门显示"),
];

const FIELDS_10A02: &[StepField] = &[
    step("total_duration", "整体耗时"),
    step("emergency_door_release_duration", "逃生门释放耗时"),
    step("operate_escape_door_unlock_handle", "操作逃生门解锁旋钮"),
    step("release_escape_door_unlock_handle", "释放逃生门解锁把手"),
    step("push_escape_door", "向外推出逃生门门板"),
    step(
        "reduce_escape_door_fall_speed",
        "逃生门释放过程中借助回收绳减缓门板下落速度",
    ),
    step("lift_escape_door_unlock_handle", "上提卡住逃生门解锁把手"),
    step("retract_escape_door", "完全收回逃生门门板"),
    step(
        "reduce_escape_door_impact_force",
        "逃生门收回过程最后阶段使用双手支撑逃生门门板减缓关门撞击力度",
    ),
    step("reset_escape_door_lock_handle", "复位解锁手柄锁闭逃生门"),
    step("reset_escape_door_unlock_handle", "复位逃生门解锁旋钮"),
    step("reset_escape_door_handle_cover", "复位逃生门把手盖板"),
    step("reset_escape_door_unlock_handle_cover", "复位逃生门旋钮盖板"),
    step("install_escape_door_recovery_rope_cover", "安装逃生门回收绳盖板"),
    step("confirm_ddu_escape_door_display", "确认DDU逃生门显示"),
];

impl DetailVariant {
    /// Maps a vehicle-model code from an upload to its detail schema.
    pub fn for_vehicle_model(code: &str) -> Option<Self> {
        match code.trim() {
            "09A02" => Some(Self::Model09A02),
            "09A03" | "09A04" => Some(Self::Model09A0304),
            "10A01" => Some(Self::Model10A01),
            "10A02" => Some(Self::Model10A02),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model09A02 => "09A02",
            Self::Model09A0304 => "09A0304",
            Self::Model10A01 => "10A01",
            Self::Model10A02 => "10A02",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Model09A02 => "assessment_09a02",
            Self::Model09A0304 => "assessment_09a0304",
            Self::Model10A01 => "assessment_10a01",
            Self::Model10A02 => "assessment_10a02",
        }
    }

    pub fn fields(self) -> &'static [StepField] {
        match self {
            Self::Model09A02 => FIELDS_09A02,
            Self::Model09A0304 => FIELDS_09A0304,
            Self::Model10A01 => FIELDS_10A01,
            Self::Model10A02 => FIELDS_10A02,
        }
    }
}
