//! Asset ledger: upsert from maintenance items, history and the role-scoped listing

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rand::Rng;

use crate::{
    calendar,
    config::AssetsConfig,
    error::{AppError, AppResult},
    models::{
        asset::{
            self, Asset, AssetCountQuery, AssetHistory, AssetListEntry, AssetQuery, AssetStatus,
            AssetUpsert, CreateAsset, CreateAssetHistory, UpdateAsset, UpdateAssetHistory,
        },
        user::UserClaims,
    },
    repository::{
        assets::{AssetFields, AssetFilter},
        Repository,
    },
};

const ASSET_CODE_PREFIX: &str = "AST-";
const ASSET_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ASSET_CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct AssetsService {
    repository: Repository,
    config: AssetsConfig,
}

/// `AST-` followed by six random base36 characters
pub fn generate_asset_code() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ASSET_CODE_ALPHABET[rng.gen_range(0..ASSET_CODE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", ASSET_CODE_PREFIX, suffix)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_status(value: Option<&str>) -> AppResult<Option<AssetStatus>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map(Some),
        None => Ok(None),
    }
}

fn parse_optional_date(value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => calendar::parse_date(s).map(Some),
        None => Ok(None),
    }
}

/// Category of an item; the hardware name when none is given
fn upsert_category(input: &AssetUpsert) -> Option<String> {
    non_empty(input.category.as_deref()).or_else(|| non_empty(Some(input.name.as_str())))
}

/// Row for an item that matched no existing asset
fn new_asset_fields(input: &AssetUpsert, asset_code: String) -> AssetFields {
    AssetFields {
        asset_code,
        name: input.name.trim().to_string(),
        category: upsert_category(input),
        serial_number: non_empty(input.serial_number.as_deref()),
        store_id: input.store_id,
        store_name: input.store_name.clone(),
        status: input.status.unwrap_or_default(),
        purchase_date: asset::estimate_purchase_date(input.maintenance_date, input.age_months_input),
        age_snapshot_months: input.age_months_input,
        last_maintenance_date: input.maintenance_date,
        last_maintenance_order: input.maintenance_order,
    }
}

/// Merge an item into a matched asset.
///
/// Existing name/category and purchase date are kept; location, status and
/// maintenance markers follow the latest report.
fn merge_asset_fields(existing: Asset, input: &AssetUpsert) -> AssetFields {
    let mut fields = AssetFields::from(existing);

    if fields.name.trim().is_empty() {
        fields.name = input.name.trim().to_string();
    }
    if non_empty(fields.category.as_deref()).is_none() {
        fields.category = upsert_category(input);
    }
    if let Some(serial) = non_empty(input.serial_number.as_deref()) {
        fields.serial_number = Some(serial);
    }
    if input.store_id.is_some() {
        fields.store_id = input.store_id;
    }
    if input.store_name.is_some() {
        fields.store_name = input.store_name.clone();
    }
    if input.maintenance_date.is_some() {
        fields.last_maintenance_date = input.maintenance_date;
    }
    if input.maintenance_order.is_some() {
        fields.last_maintenance_order = input.maintenance_order;
    }
    if let Some(status) = input.status {
        fields.status = status;
    }
    if fields.purchase_date.is_none() {
        fields.purchase_date =
            asset::estimate_purchase_date(input.maintenance_date, input.age_months_input);
    }
    if input.age_months_input.is_some() {
        fields.age_snapshot_months = input.age_months_input;
    }

    fields
}

/// Requested page size within `1..=max_limit`
fn page_limit(requested: Option<i64>, config: &AssetsConfig) -> i64 {
    requested
        .unwrap_or(config.default_limit)
        .clamp(1, config.max_limit.max(1))
}

/// Comma separated ids; anything unparsable is ignored
fn parse_store_ids(raw: Option<&str>) -> Vec<i32> {
    raw.unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

impl AssetsService {
    pub fn new(repository: Repository, config: AssetsConfig) -> Self {
        Self { repository, config }
    }

    /// Stores visible to a store-scoped caller; `None` for unrestricted roles
    async fn visible_store_ids(&self, claims: &UserClaims) -> AppResult<Option<Vec<i32>>> {
        if !claims.role.is_store_scoped() {
            return Ok(None);
        }
        let ids = self.repository.stores.ids_assigned_to(&claims.username).await?;
        Ok(Some(ids))
    }

    /// Insert, regenerating the code when a random one collides
    async fn insert_with_generated_code(&self, mut fields: AssetFields) -> AppResult<Asset> {
        let mut attempt = 1;
        loop {
            match self.repository.assets.insert(&fields).await {
                Err(AppError::Conflict(_)) if attempt < ASSET_CODE_ATTEMPTS => {
                    tracing::debug!("Asset code {} taken, retrying", fields.asset_code);
                    fields.asset_code = generate_asset_code();
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Create or update the asset described by one maintenance item
    pub async fn upsert_from_maintenance_item(&self, input: &AssetUpsert) -> AppResult<Asset> {
        let mut input = input.clone();

        if input.store_id.is_none() {
            if let Some(name) = non_empty(input.store_name.as_deref()) {
                if let Some(store) = self.repository.stores.find_by_name_or_code(&name).await? {
                    input.store_id = Some(store.id);
                    input.store_name = Some(store.name);
                }
            }
        }

        let serial = non_empty(input.serial_number.as_deref());
        let existing = match serial {
            Some(ref sn) => self.repository.assets.find_by_serial(sn, input.store_id).await?,
            None => {
                let category = upsert_category(&input);
                self.repository
                    .assets
                    .find_by_identity(input.name.trim(), category.as_deref(), input.store_id)
                    .await?
            }
        };

        match existing {
            Some(asset) => {
                let id = asset.id;
                let fields = merge_asset_fields(asset, &input);
                self.repository.assets.save(id, &fields).await
            }
            None => {
                let fields = new_asset_fields(&input, generate_asset_code());
                let created = self.insert_with_generated_code(fields).await?;
                tracing::info!(
                    "Asset {} created from maintenance item ({})",
                    created.asset_code,
                    created.name
                );
                Ok(created)
            }
        }
    }

    /// Role-scoped listing with derived age fields and latest history
    pub async fn list(
        &self,
        query: &AssetQuery,
        claims: &UserClaims,
    ) -> AppResult<Vec<AssetListEntry>> {
        let store_ids = self.visible_store_ids(claims).await?;
        if store_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }

        let filter = AssetFilter {
            q: non_empty(query.q.as_deref()),
            store_id: query.store_id,
            category: non_empty(query.category.as_deref()),
            status: parse_status(query.status.as_deref())?,
            store_ids,
            limit: page_limit(query.limit, &self.config),
            offset: query.offset.unwrap_or(0).max(0),
        };

        let assets = self.repository.assets.list(&filter).await?;
        let ids: Vec<i32> = assets.iter().map(|a| a.id).collect();
        let latest: HashMap<i32, (NaiveDate, String)> = self
            .repository
            .assets
            .latest_history(&ids)
            .await?
            .into_iter()
            .map(|h| (h.asset_id, (h.date, h.note)))
            .collect();

        let today = calendar::today();
        let threshold = self.config.old_threshold_years;
        let old_only = query.old_only.unwrap_or(false);

        let entries = assets
            .into_iter()
            .map(|asset| {
                let age_months = asset.age_months(today);
                let history = latest.get(&asset.id);
                AssetListEntry {
                    age_months,
                    is_old: asset::is_old(age_months, threshold),
                    last_history_date: history.map(|(date, _)| *date),
                    last_history_note: history.map(|(_, note)| note.clone()),
                    asset,
                }
            })
            .filter(|e| match query.age_min {
                Some(min) => e.age_months.is_some_and(|age| age >= min),
                None => true,
            })
            .filter(|e| match query.age_max {
                Some(max) => e.age_months.is_some_and(|age| age <= max),
                None => true,
            })
            .filter(|e| !old_only || e.is_old)
            .collect();

        Ok(entries)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Asset> {
        self.repository.assets.get_by_id(id).await
    }

    /// Number of assets per requested store, limited to the caller's stores for scoped roles
    pub async fn count_by_store(
        &self,
        query: &AssetCountQuery,
        claims: &UserClaims,
    ) -> AppResult<BTreeMap<i32, i64>> {
        let mut ids = parse_store_ids(query.store_ids.as_deref());
        if let Some(allowed) = self.visible_store_ids(claims).await? {
            ids.retain(|id| allowed.contains(id));
        }
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let counts = self.repository.assets.count_by_store(&ids).await?;
        Ok(counts.into_iter().map(|c| (c.store_id, c.count)).collect())
    }

    pub async fn create(&self, data: &CreateAsset) -> AppResult<Asset> {
        let fields = AssetFields {
            asset_code: non_empty(data.asset_code.as_deref()).unwrap_or_else(generate_asset_code),
            name: data.name.trim().to_string(),
            category: non_empty(data.category.as_deref()),
            serial_number: non_empty(data.serial_number.as_deref()),
            store_id: data.store_id,
            store_name: non_empty(data.store_name.as_deref()),
            status: parse_status(data.status.as_deref())?.unwrap_or_default(),
            purchase_date: parse_optional_date(data.purchase_date.as_deref())?,
            age_snapshot_months: data.age_snapshot_months,
            last_maintenance_date: None,
            last_maintenance_order: None,
        };

        if data.asset_code.is_some() {
            self.repository.assets.insert(&fields).await
        } else {
            self.insert_with_generated_code(fields).await
        }
    }

    pub async fn update(&self, id: i32, data: &UpdateAsset) -> AppResult<Asset> {
        let mut fields = AssetFields::from(self.repository.assets.get_by_id(id).await?);

        if let Some(code) = non_empty(data.asset_code.as_deref()) {
            fields.asset_code = code;
        }
        if let Some(name) = non_empty(data.name.as_deref()) {
            fields.name = name;
        }
        if data.category.is_some() {
            fields.category = non_empty(data.category.as_deref());
        }
        if data.serial_number.is_some() {
            fields.serial_number = non_empty(data.serial_number.as_deref());
        }
        if data.store_id.is_some() {
            fields.store_id = data.store_id;
        }
        if data.store_name.is_some() {
            fields.store_name = non_empty(data.store_name.as_deref());
        }
        if let Some(status) = parse_status(data.status.as_deref())? {
            fields.status = status;
        }
        if data.purchase_date.is_some() {
            fields.purchase_date = parse_optional_date(data.purchase_date.as_deref())?;
        }
        if data.age_snapshot_months.is_some() {
            fields.age_snapshot_months = data.age_snapshot_months;
        }

        self.repository.assets.save(id, &fields).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.assets.delete(id).await
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Append a history entry without touching existing ones
    pub async fn record_history(
        &self,
        asset_id: i32,
        date: NaiveDate,
        note: &str,
        created_by: Option<&str>,
    ) -> AppResult<AssetHistory> {
        self.repository
            .assets
            .add_history(asset_id, date, note, created_by)
            .await
    }

    pub async fn add_history(
        &self,
        asset_id: i32,
        data: &CreateAssetHistory,
        caller: &str,
    ) -> AppResult<AssetHistory> {
        self.repository.assets.get_by_id(asset_id).await?;
        let date = parse_optional_date(data.date.as_deref())?.unwrap_or_else(calendar::today);
        let created_by = non_empty(data.created_by.as_deref()).unwrap_or_else(|| caller.to_string());
        self.record_history(asset_id, date, data.note.trim(), Some(&created_by))
            .await
    }

    pub async fn list_history(&self, asset_id: i32) -> AppResult<Vec<AssetHistory>> {
        self.repository.assets.get_by_id(asset_id).await?;
        self.repository.assets.list_history(asset_id).await
    }

    pub async fn update_history(
        &self,
        asset_id: i32,
        id: i32,
        data: &UpdateAssetHistory,
    ) -> AppResult<AssetHistory> {
        let date = parse_optional_date(data.date.as_deref())?;
        self.repository
            .assets
            .update_history(asset_id, id, date, data.note.as_deref())
            .await?
            .ok_or_else(|| history_not_found(asset_id, id))
    }

    pub async fn delete_history(&self, asset_id: i32, id: i32) -> AppResult<()> {
        if self.repository.assets.delete_history(asset_id, id).await? {
            Ok(())
        } else {
            Err(history_not_found(asset_id, id))
        }
    }
}

fn history_not_found(asset_id: i32, id: i32) -> AppError {
    AppError::NotFound(format!("History entry {} not found for asset {}", id, asset_id))
}
