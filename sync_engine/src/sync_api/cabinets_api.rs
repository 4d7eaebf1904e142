use log::*;

use crate::{
    db_types::{Cabinet, NewCabinet, UpdateCabinetRequest},
    traits::{CabinetManagement, SyncEngineError},
};

/// CRUD surface for panel cabinets. The admin UI is the only caller that mutates; the orchestrator reads.
#[derive(Debug, Clone)]
pub struct CabinetApi<B> {
    db: B,
}

impl<B> CabinetApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CabinetApi<B>
where B: CabinetManagement
{
    pub async fn create(&self, cabinet: NewCabinet) -> Result<Cabinet, SyncEngineError> {
        let cabinet = self.db.insert_cabinet(cabinet).await?;
        info!("🗂️ Cabinet [{}] created with id {}", cabinet.name, cabinet.id);
        Ok(cabinet)
    }

    pub async fn cabinet(&self, id: i64) -> Result<Cabinet, SyncEngineError> {
        self.db.fetch_cabinet(id).await?.ok_or(SyncEngineError::CabinetNotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Cabinet>, SyncEngineError> {
        self.db.fetch_all_cabinets().await
    }

    pub async fn update(&self, id: i64, update: UpdateCabinetRequest) -> Result<Cabinet, SyncEngineError> {
        let updated = self.db.update_cabinet(id, update).await?.ok_or(SyncEngineError::CabinetNotFound(id))?;
        info!("🗂️ Cabinet {id} updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), SyncEngineError> {
        if self.db.delete_cabinet(id).await? {
            info!("🗂️ Cabinet {id} deleted");
            Ok(())
        } else {
            Err(SyncEngineError::CabinetNotFound(id))
        }
    }
}
