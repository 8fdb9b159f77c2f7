// Appliance resource endpoints
//
// Appliance listing, settings, status values and programs, built on
// `ApiClient::execute`.

use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::client::{ApiClient, ApiRequest};
use crate::error::Error;
use crate::keys;
use crate::models::{
    ApplianceList, Data, DataEnvelope, HomeAppliance, Program, SettingList, SettingUpdate,
    SettingValue, StatusList,
};

const APPLIANCES: &str = "api/homeappliances";

fn appliance_path(ha_id: &str, rest: &str) -> String {
    format!("{APPLIANCES}/{ha_id}/{rest}")
}

impl ApiClient {
    // ── Appliances ───────────────────────────────────────────────────

    /// List all paired appliances.
    ///
    /// `GET /api/homeappliances`
    pub async fn list_appliances(&self) -> Result<Vec<HomeAppliance>, Error> {
        debug!("listing appliances");
        let resp = self.execute(&ApiRequest::get(APPLIANCES)).await?;
        let envelope: DataEnvelope<ApplianceList> = resp.json()?;
        Ok(envelope.data.homeappliances)
    }

    /// Get one appliance.
    ///
    /// `GET /api/homeappliances/{haId}`
    pub async fn get_appliance(&self, ha_id: &str) -> Result<HomeAppliance, Error> {
        debug!(ha_id, "fetching appliance");
        let resp = self
            .execute(&ApiRequest::get(format!("{APPLIANCES}/{ha_id}")))
            .await?;
        let envelope: DataEnvelope<HomeAppliance> = resp.json()?;
        Ok(envelope.data)
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// `GET /api/homeappliances/{haId}/settings/{key}`
    pub async fn get_setting(&self, ha_id: &str, key: &str) -> Result<Data, Error> {
        self.get_data(appliance_path(ha_id, &format!("settings/{key}")))
            .await
    }

    /// `GET /api/homeappliances/{haId}/settings`
    pub async fn get_settings(&self, ha_id: &str) -> Result<Vec<Data>, Error> {
        let resp = self
            .execute(&ApiRequest::get(appliance_path(ha_id, "settings")))
            .await?;
        let envelope: DataEnvelope<SettingList> = resp.json()?;
        Ok(envelope.data.settings)
    }

    /// Write a setting.
    ///
    /// `PUT /api/homeappliances/{haId}/settings/{key}` with
    /// `{"data": {"key": ..., "value": ...}}`; success is 204 No Content.
    pub async fn put_setting(
        &self,
        ha_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), Error> {
        debug!(ha_id, key, %value, "writing setting");
        let body = serde_json::to_value(SettingUpdate {
            data: SettingValue { key, value },
        })
        .map_err(|e| Error::configuration(format!("unserializable setting value: {e}")))?;

        self.execute(&ApiRequest::put(
            appliance_path(ha_id, &format!("settings/{key}")),
            body,
        ))
        .await?;
        Ok(())
    }

    // ── Status ───────────────────────────────────────────────────────

    /// `GET /api/homeappliances/{haId}/status/{key}`
    pub async fn get_status(&self, ha_id: &str, key: &str) -> Result<Data, Error> {
        self.get_data(appliance_path(ha_id, &format!("status/{key}")))
            .await
    }

    /// `GET /api/homeappliances/{haId}/status`
    pub async fn get_statuses(&self, ha_id: &str) -> Result<Vec<Data>, Error> {
        let resp = self
            .execute(&ApiRequest::get(appliance_path(ha_id, "status")))
            .await?;
        let envelope: DataEnvelope<StatusList> = resp.json()?;
        Ok(envelope.data.status)
    }

    // ── Programs ─────────────────────────────────────────────────────

    /// The running program, or `None` if the appliance reports 404.
    ///
    /// `GET /api/homeappliances/{haId}/programs/active`
    pub async fn get_active_program(&self, ha_id: &str) -> Result<Option<Program>, Error> {
        self.get_program(ha_id, "programs/active").await
    }

    /// The selected (not necessarily running) program, or `None` on 404.
    ///
    /// `GET /api/homeappliances/{haId}/programs/selected`
    pub async fn get_selected_program(&self, ha_id: &str) -> Result<Option<Program>, Error> {
        self.get_program(ha_id, "programs/selected").await
    }

    async fn get_program(&self, ha_id: &str, which: &str) -> Result<Option<Program>, Error> {
        let request = ApiRequest::get(appliance_path(ha_id, which))
            .accept(&[StatusCode::OK, StatusCode::NOT_FOUND]);
        let resp = self.execute(&request).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(ha_id, which, "no program");
            return Ok(None);
        }

        let envelope: DataEnvelope<Program> = resp.json()?;
        Ok(Some(envelope.data))
    }

    // ── Well-known keys ──────────────────────────────────────────────

    pub async fn get_power_state(&self, ha_id: &str) -> Result<Data, Error> {
        self.get_setting(ha_id, keys::POWER_STATE).await
    }

    /// Set the power state, e.g. [`keys::POWER_STATE_ON`].
    pub async fn set_power_state(&self, ha_id: &str, state: &str) -> Result<(), Error> {
        self.put_setting(ha_id, keys::POWER_STATE, &json!(state))
            .await
    }

    pub async fn get_door_state(&self, ha_id: &str) -> Result<Data, Error> {
        self.get_status(ha_id, keys::DOOR_STATE).await
    }

    pub async fn get_operation_state(&self, ha_id: &str) -> Result<Data, Error> {
        self.get_status(ha_id, keys::OPERATION_STATE).await
    }

    pub async fn get_remote_control_active_state(&self, ha_id: &str) -> Result<Data, Error> {
        self.get_status(ha_id, keys::REMOTE_CONTROL_ACTIVE).await
    }

    pub async fn get_remote_start_allowance_state(&self, ha_id: &str) -> Result<Data, Error> {
        self.get_status(ha_id, keys::REMOTE_CONTROL_START_ALLOWED)
            .await
    }

    pub async fn get_local_control_active_state(&self, ha_id: &str) -> Result<Data, Error> {
        self.get_status(ha_id, keys::LOCAL_CONTROL_ACTIVE).await
    }

    async fn get_data(&self, path: String) -> Result<Data, Error> {
        let resp = self.execute(&ApiRequest::get(path)).await?;
        let envelope: DataEnvelope<Data> = resp.json()?;
        Ok(envelope.data)
    }
}
